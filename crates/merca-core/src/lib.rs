//! # Merca Core
//!
//! Pure domain logic for the Merca B2B ordering platform: money arithmetic,
//! the four discount rule families, rule validation, the per-product discount
//! resolver, and order-level pricing.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            merca-core                                   │
//! │                                                                         │
//! │  money ──────► Money (i64 cents + Currency), Rate (basis points)        │
//! │  types ──────► Organisation, Product, Customer, status enums            │
//! │  rules ──────► ProductDiscount / CustomerDiscount /                     │
//! │                CustomerProductDiscount / OrderDiscount                  │
//! │  validation ─► per-family field + window-overlap checks                 │
//! │  resolver ───► rules in force ──► one effective price                   │
//! │  order ──────► Order, OrderItem, the pricing waterfall                  │
//! │  error ──────► CoreError, ValidationError                               │
//! │                                                                         │
//! │  No IO anywhere in this crate. Persistence lives in merca-db.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! - **Integer money**: every amount is i64 cents; rates are u32 basis
//!   points. No floating point touches a price.
//! - **Pure functions at the core**: the resolver and the pricing waterfall
//!   take plain data in and return plain data out, so every pricing rule is
//!   testable without a database.
//! - **Derived state**: whether a rule is in force is always computed from
//!   its active flag and window, never stored.

pub mod error;
pub mod money;
pub mod order;
pub mod resolver;
pub mod rules;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, Money, Rate};
pub use order::{
    generate_order_number, price_order, AppliedOrderDiscount, ManualDiscount, Order, OrderItem,
    OrderPricing,
};
pub use resolver::{
    resolve, Candidate, DiscountBreakdown, DiscountSource, EffectiveDiscount, PricingContext,
    PricingMode, RuleSet,
};
pub use rules::{
    CustomerDiscount, CustomerProductDiscount, DiscountKind, DiscountTerms, DiscountValue,
    OrderDiscount, ProductDiscount, ValidityWindow,
};
pub use types::{
    Customer, DeliveryMethod, OrderStatus, Organisation, PaymentStatus, Product, ProductSnapshot,
};
