//! # Domain Types
//!
//! Core domain types used throughout Merca.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Customer     │   │  Organisation   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  organisation   │   │  slug (business)│       │
//! │  │  price_cents    │   │  company_name   │   │  tax_rate_bps   │       │
//! │  │  min_order_qty  │   │  active         │   │  shipping_cents │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  OrderStatus    │   │ PaymentStatus   │   │ DeliveryMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  InProcess      │   │  Pending        │   │  Delivery       │       │
//! │  │  Processed      │   │  Paid | Failed  │   │  Pickup         │       │
//! │  │  Completed      │   │  Refunded       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, slug, order_number) - human-readable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, Money, Rate};

// =============================================================================
// Organisation
// =============================================================================

/// A selling organisation (tenant). Owns products, customers, and rules.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Organisation {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// URL slug - business identifier, also the order-number prefix.
    pub slug: String,

    /// Currency every amount in this organisation is denominated in.
    pub currency: Currency,

    /// Tax rate in basis points (800 = 8%).
    pub tax_rate_bps: u32,

    /// Flat shipping cost in cents, waived for pickup orders.
    pub shipping_cost_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Organisation {
    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }

    /// Returns the flat shipping cost as Money.
    #[inline]
    pub fn shipping_cost(&self) -> Money {
        Money::from_cents(self.shipping_cost_cents, self.currency)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for ordering.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Organisation this product belongs to.
    pub organisation_id: String,

    /// Stock Keeping Unit - business identifier, unique per organisation.
    pub sku: String,

    /// Display name shown in the storefront.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// List price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Currency of the price.
    pub currency: Currency,

    /// Minimum quantity a customer may order. Product discounts may not set
    /// a minimum-quantity gate below this floor.
    pub min_order_quantity: i64,

    /// Whether product is active (soft delete).
    pub active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents, self.currency)
    }

    /// Returns the lightweight snapshot the resolver consumes.
    #[inline]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            price: self.price(),
            min_order_quantity: self.min_order_quantity,
        }
    }
}

/// The slice of a product the resolver needs: its list price and its order
/// floor. Resolution never touches the rest of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub price: Money,
    pub min_order_quantity: i64,
}

// =============================================================================
// Customer
// =============================================================================

/// A buying customer account.
///
/// The core treats customers purely as scope keys for rule lookup;
/// it never inspects contact details.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Organisation this customer belongs to.
    pub organisation_id: String,

    /// Company name (identification only, not used in pricing).
    pub company_name: String,

    /// Whether the account may place orders.
    pub active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Administrative processing state of a placed order.
///
/// Transitions run strictly forward: InProcess → Processed → Completed.
/// Independent of [`PaymentStatus`] by design - a completed B2B order may
/// still be awaiting invoice payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order received, fulfilment not started.
    InProcess,
    /// Order picked/packed.
    Processed,
    /// Order shipped or handed over.
    Completed,
}

impl OrderStatus {
    /// Whether moving to `next` is a legal forward step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::InProcess, OrderStatus::Processed)
                | (OrderStatus::Processed, OrderStatus::Completed)
        )
    }

    /// Snake-case name, matching the persisted form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProcess => "in_process",
            OrderStatus::Processed => "processed",
            OrderStatus::Completed => "completed",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::InProcess
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state of an order, advanced by the (external) billing flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting payment.
    Pending,
    /// Payment received.
    Paid,
    /// Payment attempt failed; may be retried (back to Pending).
    Failed,
    /// Payment returned after the fact.
    Refunded,
}

impl PaymentStatus {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Pending)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }

    /// Snake-case name, matching the persisted form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Delivery Method
// =============================================================================

/// How the order leaves the warehouse. Pickup waives the shipping charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Shipped to the customer's address at the organisation's flat cost.
    Delivery,
    /// Collected by the customer; no shipping charge.
    Pickup,
}

impl Default for DeliveryMethod {
    fn default() -> Self {
        DeliveryMethod::Delivery
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::InProcess.can_transition_to(OrderStatus::Processed));
        assert!(OrderStatus::Processed.can_transition_to(OrderStatus::Completed));

        // No skipping, no going back
        assert!(!OrderStatus::InProcess.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::InProcess));
        assert!(!OrderStatus::Processed.can_transition_to(OrderStatus::InProcess));
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Pending));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));

        assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::InProcess);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(DeliveryMethod::default(), DeliveryMethod::Delivery);
    }

    #[test]
    fn test_product_snapshot() {
        let now = Utc::now();
        let product = Product {
            id: "p1".into(),
            organisation_id: "org1".into(),
            sku: "WIDGET-10".into(),
            name: "Widget".into(),
            description: None,
            price_cents: 1000,
            currency: Currency::Eur,
            min_order_quantity: 5,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let snap = product.snapshot();
        assert_eq!(snap.price, Money::eur(1000));
        assert_eq!(snap.min_order_quantity, 5);
    }
}
