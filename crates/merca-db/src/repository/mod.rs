//! # Repository Module
//!
//! Database repository implementations for the Merca platform.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  API handler                                                           │
//! │       │                                                                 │
//! │       │  db.rules().rules_for_product(product_id, customer_id)         │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  RuleRepository                                                        │
//! │  ├── create_customer_discount(...)   (validates inside a write txn)    │
//! │  ├── rules_for_product(...)                                            │
//! │  └── order_discounts(...)                                              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Domain rules (validation, resolution, pricing) stay in merca-core;    │
//! │  repositories fetch, call into core, and persist the result.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Organisations, products, customers
//! - [`rule::RuleRepository`] - The four discount rule families
//! - [`order::OrderRepository`] - Cart lifecycle, pricing, placement

pub mod catalog;
pub mod order;
pub mod rule;
