//! # Orders & Order Pricing
//!
//! The order record, its line items, and the order-level pricing waterfall.
//!
//! ## Pricing Waterfall
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Σ line totals (snapshot unit price × qty, line discount applied)       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  subtotal ──► auto tier (best OrderDiscount the subtotal qualifies for) │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  − manual discount (staff-entered, on the post-tier amount)             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  + tax (organisation rate × discounted subtotal)                        │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  + shipping (flat organisation cost; zero for pickup)                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  grand total                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Semantics
//! Line items freeze the name, unit price, and effective discount rate at
//! the moment they enter the cart. A draft re-resolves its lines when they
//! change; a placed order never changes again, whatever happens to the rules
//! afterwards.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::rules::{DiscountValue, OrderDiscount};
use crate::types::{DeliveryMethod, OrderStatus, Organisation, PaymentStatus};

// =============================================================================
// Order Items
// =============================================================================

/// One line of an order, frozen at the moment it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product name at snapshot time; survives later renames.
    pub name_snapshot: String,
    /// Catalog unit price at snapshot time, before discounts.
    pub unit_price: Money,
    pub quantity: i64,
    /// Effective discount at snapshot time, as resolved for this customer
    /// and quantity. Zero when no discount applied.
    pub discount_rate: Rate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Unit price with the snapshot discount applied.
    pub fn discounted_unit_price(&self) -> Money {
        (self.unit_price - self.unit_price.apply_rate(self.discount_rate)).floor_zero()
    }

    /// Line total: discounted unit price × quantity.
    ///
    /// Discounting the unit price before multiplying keeps a line's total
    /// an exact multiple of its displayed unit price.
    pub fn line_total(&self) -> Money {
        self.discounted_unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order-Level Discounts
// =============================================================================

/// A staff-entered discount on the whole order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ManualDiscount {
    pub value: DiscountValue,
    /// Free-text justification for the audit trail.
    pub reason: Option<String>,
    /// Staff member who granted it.
    pub applied_by: Option<String>,
}

/// The automatic tier applied to an order, frozen with its computed amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedOrderDiscount {
    pub order_discount_id: String,
    pub value: DiscountValue,
    pub amount: Money,
}

// =============================================================================
// Order Pricing
// =============================================================================

/// Every intermediate figure of the pricing waterfall, so receipts and the
/// storefront can show the full breakdown without re-deriving anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderPricing {
    pub subtotal: Money,
    pub auto_discount: Option<AppliedOrderDiscount>,
    pub subtotal_after_auto: Money,
    pub manual_discount_amount: Money,
    pub subtotal_after_discounts: Money,
    pub tax: Money,
    pub shipping: Money,
    pub grand_total: Money,
}

/// Runs the order pricing waterfall.
///
/// `tiers` are the organisation's order discounts; the best in-force tier
/// the subtotal qualifies for is applied automatically. The manual discount,
/// when present, bites on the post-tier amount.
pub fn price_order(
    items: &[OrderItem],
    tiers: &[OrderDiscount],
    manual: Option<&ManualDiscount>,
    organisation: &Organisation,
    delivery: DeliveryMethod,
    today: NaiveDate,
) -> OrderPricing {
    let currency = organisation.currency;
    let subtotal = items
        .iter()
        .fold(Money::zero(currency), |acc, item| acc + item.line_total());

    let auto_discount = OrderDiscount::best_tier(tiers, subtotal, today).map(|tier| {
        AppliedOrderDiscount {
            order_discount_id: tier.id.clone(),
            value: tier.terms.value,
            amount: tier.discount_amount(subtotal),
        }
    });
    let auto_amount = auto_discount
        .as_ref()
        .map(|d| d.amount)
        .unwrap_or_else(|| Money::zero(currency));
    let subtotal_after_auto = (subtotal - auto_amount).floor_zero();

    let manual_discount_amount = manual
        .map(|m| m.value.savings_on(subtotal_after_auto))
        .unwrap_or_else(|| Money::zero(currency));
    let subtotal_after_discounts = (subtotal_after_auto - manual_discount_amount).floor_zero();

    let tax = subtotal_after_discounts.apply_rate(organisation.tax_rate());
    let shipping = match delivery {
        DeliveryMethod::Delivery => organisation.shipping_cost(),
        DeliveryMethod::Pickup => Money::zero(currency),
    };

    OrderPricing {
        subtotal,
        auto_discount,
        subtotal_after_auto,
        manual_discount_amount,
        subtotal_after_discounts,
        tax,
        shipping,
        grand_total: subtotal_after_discounts + tax + shipping,
    }
}

// =============================================================================
// Order Record
// =============================================================================

/// An order: one per draft cart, frozen forever once placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub organisation_id: String,
    pub customer_id: String,
    /// Human-facing number, assigned at creation: `SLUG-YYYYMMDDHHMMSS-NNNN`.
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_method: DeliveryMethod,
    pub manual_discount: Option<ManualDiscount>,
    /// The tier applied at placement, frozen with its amount.
    pub auto_discount: Option<AppliedOrderDiscount>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub shipping_amount: Money,
    pub total: Money,
    pub notes: Option<String>,
    /// Set exactly once; a placed order is immutable.
    #[ts(as = "Option<String>")]
    pub placed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh draft cart with zeroed totals.
    pub fn draft(
        id: String,
        organisation: &Organisation,
        customer_id: String,
        sequence: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let zero = Money::zero(organisation.currency);
        Order {
            id,
            organisation_id: organisation.id.clone(),
            customer_id,
            order_number: generate_order_number(&organisation.slug, sequence, now),
            status: OrderStatus::default(),
            payment_status: PaymentStatus::default(),
            delivery_method: DeliveryMethod::default(),
            manual_discount: None,
            auto_discount: None,
            subtotal: zero,
            tax_amount: zero,
            shipping_amount: zero,
            total: zero,
            notes: None,
            placed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the order has been placed.
    pub fn is_placed(&self) -> bool {
        self.placed_at.is_some()
    }

    /// Guard used by every mutation: placed orders are read-only.
    pub fn ensure_draft(&self) -> CoreResult<()> {
        if self.is_placed() {
            return Err(CoreError::AlreadyPlaced {
                order_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Freezes the pricing onto the order and marks it placed.
    pub fn place(&mut self, pricing: &OrderPricing, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_draft()?;
        self.apply_pricing(pricing);
        self.placed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Copies waterfall figures onto the stored columns. Re-run for drafts
    /// whenever lines or discounts change.
    pub fn apply_pricing(&mut self, pricing: &OrderPricing) {
        self.auto_discount = pricing.auto_discount.clone();
        self.subtotal = pricing.subtotal;
        self.tax_amount = pricing.tax;
        self.shipping_amount = pricing.shipping;
        self.total = pricing.grand_total;
    }

    /// Advances the fulfilment status, rejecting backward or skipped steps.
    pub fn set_status(&mut self, next: OrderStatus, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "order status",
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Advances the payment status along its allowed transitions.
    pub fn set_payment_status(
        &mut self,
        next: PaymentStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if !self.payment_status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                entity: "payment status",
                from: self.payment_status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.payment_status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Builds a human-facing order number: organisation slug (uppercased),
/// UTC timestamp, and a zero-padded per-organisation sequence.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use merca_core::order::generate_order_number;
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
/// assert_eq!(generate_order_number("acme", 7, at), "ACME-20260305143000-0007");
/// ```
pub fn generate_order_number(slug: &str, sequence: u32, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{:04}",
        slug.to_uppercase(),
        at.format("%Y%m%d%H%M%S"),
        sequence
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
