//! # Discount Rule Family
//!
//! The four discount-rule record shapes and the pieces they share.
//!
//! ## Shared Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Discount Rule Family                              │
//! │                                                                         │
//! │          DiscountTerms (common to all four families)                    │
//! │          ┌──────────────────────────────────────────┐                   │
//! │          │ value: Percentage(Rate) | Fixed(Money)   │                   │
//! │          │ window: [valid_from, valid_until]        │                   │
//! │          │ stackable: bool      active: bool        │                   │
//! │          └──────────────────────────────────────────┘                   │
//! │               ▲            ▲            ▲            ▲                  │
//! │               │            │            │            │                  │
//! │  ┌────────────┴┐  ┌────────┴───┐  ┌─────┴────────┐  ┌┴─────────────┐   │
//! │  │ Product     │  │ Customer   │  │ Customer×    │  │ Order        │   │
//! │  │ Discount    │  │ Discount   │  │ Product      │  │ Discount     │   │
//! │  │ ─────────── │  │ ────────── │  │ Discount     │  │ ──────────── │   │
//! │  │ product     │  │ customer   │  │ customer +   │  │ organisation │   │
//! │  │ min_quantity│  │            │  │ product      │  │ min_order_amt│   │
//! │  └─────────────┘  └────────────┘  └──────────────┘  └──────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rule's effective state is always *derived*, never stored:
//! `in_force(today) = active && window.contains(today)`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};

// =============================================================================
// Discount Kind & Value
// =============================================================================

/// The two discount kinds. Stored as a plain column; the typed payload
/// lives in [`DiscountValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// A fraction of the price (0 < value ≤ 100%).
    Percentage,
    /// An absolute amount off (> 0).
    Fixed,
}

impl DiscountKind {
    /// Snake-case name, matching the persisted form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "percentage",
            DiscountKind::Fixed => "fixed",
        }
    }
}

/// A discount's kind and magnitude as one tagged value.
///
/// Modelling kind and magnitude together makes an invalid pairing (a
/// percentage kind with a money payload, say) unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    Percentage(Rate),
    Fixed(Money),
}

impl DiscountValue {
    /// The kind column this value persists under.
    pub const fn kind(&self) -> DiscountKind {
        match self {
            DiscountValue::Percentage(_) => DiscountKind::Percentage,
            DiscountValue::Fixed(_) => DiscountKind::Fixed,
        }
    }

    /// Savings this value produces against `base`, capped so savings never
    /// exceed the base (a €5 reduction on a €3 product saves €3).
    pub fn savings_on(&self, base: Money) -> Money {
        match self {
            DiscountValue::Percentage(rate) => base.apply_rate(*rate),
            DiscountValue::Fixed(amount) => (*amount).min(base).floor_zero(),
        }
    }

    /// Applies this value to a running price and returns the remainder,
    /// floored at zero. Used by the resolver's stacking pass, where
    /// percentages bite on the *remaining* price, not the original.
    pub fn apply_to(&self, remaining: Money) -> Money {
        match self {
            DiscountValue::Percentage(rate) => {
                (remaining - remaining.apply_rate(*rate)).floor_zero()
            }
            DiscountValue::Fixed(amount) => (remaining - *amount).floor_zero(),
        }
    }
}

// =============================================================================
// Validity Window
// =============================================================================

/// An inclusive date range; either bound may be open (None = unbounded).
///
/// A window with both bounds open is *perpetual* - always in force while the
/// rule's active flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ValidityWindow {
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub until: Option<NaiveDate>,
}

impl ValidityWindow {
    /// A window with explicit bounds (either may be None).
    pub const fn new(from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        ValidityWindow { from, until }
    }

    /// The always-in-force window.
    pub const fn perpetual() -> Self {
        ValidityWindow {
            from: None,
            until: None,
        }
    }

    /// True when both bounds are open.
    pub const fn is_perpetual(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }

    /// True when `until` does not precede `from` (vacuously true with any
    /// open bound).
    pub fn bounds_ordered(&self) -> bool {
        match (self.from, self.until) {
            (Some(from), Some(until)) => until >= from,
            _ => true,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, day: NaiveDate) -> bool {
        let started = self.from.map_or(true, |from| from <= day);
        let not_ended = self.until.map_or(true, |until| until >= day);
        started && not_ended
    }

    /// Interval overlap with open bounds treated as −∞/+∞:
    /// windows overlap iff NOT (a.until < b.from OR a.from > b.until).
    ///
    /// A perpetual window therefore overlaps every other window.
    pub fn overlaps(&self, other: &ValidityWindow) -> bool {
        let ends_before = match (self.until, other.from) {
            (Some(a_until), Some(b_from)) => a_until < b_from,
            _ => false,
        };
        let starts_after = match (self.from, other.until) {
            (Some(a_from), Some(b_until)) => a_from > b_until,
            _ => false,
        };
        !(ends_before || starts_after)
    }
}

// =============================================================================
// Discount Terms (shared shape)
// =============================================================================

/// The fields every rule family shares. Family records embed this and add
/// their scope and extension fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountTerms {
    /// Kind and magnitude.
    pub value: DiscountValue,
    /// When the rule is in force (inclusive, open bounds allowed).
    pub window: ValidityWindow,
    /// Stackable rules combine; exclusive rules compete (best one wins).
    pub stackable: bool,
    /// Staff kill-switch, independent of the window.
    pub active: bool,
}

impl DiscountTerms {
    /// Derived effective state for a given day.
    pub fn in_force(&self, today: NaiveDate) -> bool {
        self.active && self.window.contains(today)
    }
}

// =============================================================================
// Rule Families
// =============================================================================

/// Product-wide sale: applies to every customer buying `product_id`,
/// gated by a minimum quantity in purchase mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDiscount {
    pub id: String,
    pub organisation_id: String,
    pub product_id: String,
    /// Quantity at which the sale price kicks in (≥ 1, and never below the
    /// product's own minimum order quantity).
    pub min_quantity: i64,
    pub terms: DiscountTerms,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Customer-wide tier: one customer's negotiated blanket discount.
/// At most one may be in force per customer at any time (overlap-validated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerDiscount {
    pub id: String,
    pub organisation_id: String,
    pub customer_id: String,
    pub terms: DiscountTerms,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Customer×product custom price: the most specific rule scope.
/// At most one may be in force per (customer, product) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerProductDiscount {
    pub id: String,
    pub organisation_id: String,
    pub customer_id: String,
    pub product_id: String,
    pub terms: DiscountTerms,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Order-total tier: organisation-wide threshold discount, keyed by a
/// minimum order amount. The highest threshold the subtotal meets wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDiscount {
    pub id: String,
    pub organisation_id: String,
    /// Threshold the order subtotal must meet (> 0).
    pub min_order_amount: Money,
    pub terms: DiscountTerms,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl OrderDiscount {
    /// Whether an order subtotal qualifies for this tier.
    pub fn applicable_to(&self, order_total: Money) -> bool {
        order_total >= self.min_order_amount
    }

    /// Discount amount for a qualifying subtotal; exactly zero when the
    /// subtotal is below the threshold.
    pub fn discount_amount(&self, order_total: Money) -> Money {
        if !self.applicable_to(order_total) {
            return order_total.zeroed();
        }
        self.terms.value.savings_on(order_total)
    }

    /// Picks the best tier an order qualifies for: among the in-force tiers
    /// with `min_order_amount ≤ subtotal`, the one with the highest
    /// threshold.
    pub fn best_tier<'a>(
        tiers: &'a [OrderDiscount],
        subtotal: Money,
        today: NaiveDate,
    ) -> Option<&'a OrderDiscount> {
        tiers
            .iter()
            .filter(|tier| tier.terms.in_force(today) && tier.applicable_to(subtotal))
            .max_by_key(|tier| tier.min_order_amount.cents())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn terms(value: DiscountValue, window: ValidityWindow, stackable: bool) -> DiscountTerms {
        DiscountTerms {
            value,
            window,
            stackable,
            active: true,
        }
    }

    fn tier(min_amount: i64, value: DiscountValue) -> OrderDiscount {
        let now = Utc::now();
        OrderDiscount {
            id: format!("tier-{min_amount}"),
            organisation_id: "org1".into(),
            min_order_amount: Money::eur(min_amount),
            terms: terms(value, ValidityWindow::perpetual(), false),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_window_contains() {
        let window = ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31)));
        assert!(window.contains(day(2026, 1, 1))); // inclusive start
        assert!(window.contains(day(2026, 1, 31))); // inclusive end
        assert!(!window.contains(day(2025, 12, 31)));
        assert!(!window.contains(day(2026, 2, 1)));

        let open_start = ValidityWindow::new(None, Some(day(2026, 1, 31)));
        assert!(open_start.contains(day(2020, 6, 1)));
        assert!(!open_start.contains(day(2026, 2, 1)));

        assert!(ValidityWindow::perpetual().contains(day(2030, 12, 25)));
    }

    #[test]
    fn test_window_overlap_truth_table() {
        let jan = ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31)));
        let feb = ValidityWindow::new(Some(day(2026, 2, 1)), Some(day(2026, 2, 28)));
        let mid_jan = ValidityWindow::new(Some(day(2026, 1, 15)), Some(day(2026, 2, 10)));

        assert!(!jan.overlaps(&feb));
        assert!(!feb.overlaps(&jan));
        assert!(jan.overlaps(&mid_jan));
        assert!(mid_jan.overlaps(&feb));

        // Touching endpoints count as overlap (inclusive dates)
        let jan_end = ValidityWindow::new(Some(day(2026, 1, 31)), Some(day(2026, 3, 1)));
        assert!(jan.overlaps(&jan_end));
    }

    #[test]
    fn test_window_overlap_open_bounds() {
        let jan = ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31)));
        let from_feb = ValidityWindow::new(Some(day(2026, 2, 1)), None);
        let until_dec = ValidityWindow::new(None, Some(day(2025, 12, 1)));

        assert!(!jan.overlaps(&from_feb));
        assert!(!jan.overlaps(&until_dec));
        assert!(from_feb.overlaps(&ValidityWindow::new(Some(day(2027, 5, 1)), None)));

        // Perpetual overlaps everything, including another perpetual
        let perpetual = ValidityWindow::perpetual();
        assert!(perpetual.overlaps(&jan));
        assert!(jan.overlaps(&perpetual));
        assert!(perpetual.overlaps(&ValidityWindow::perpetual()));
    }

    #[test]
    fn test_in_force_requires_active_flag_and_window() {
        let mut t = terms(
            DiscountValue::Percentage(Rate::from_bps(1000)),
            ValidityWindow::new(Some(day(2026, 1, 1)), Some(day(2026, 1, 31))),
            true,
        );
        assert!(t.in_force(day(2026, 1, 15)));
        assert!(!t.in_force(day(2026, 2, 15)));

        t.active = false;
        assert!(!t.in_force(day(2026, 1, 15)));
    }

    #[test]
    fn test_savings_on_caps_fixed_at_base() {
        let five_off = DiscountValue::Fixed(Money::eur(500));
        assert_eq!(five_off.savings_on(Money::eur(300)), Money::eur(300));
        assert_eq!(five_off.savings_on(Money::eur(1000)), Money::eur(500));
    }

    #[test]
    fn test_apply_to_floors_at_zero() {
        let five_off = DiscountValue::Fixed(Money::eur(500));
        assert_eq!(five_off.apply_to(Money::eur(300)), Money::eur(0));

        let twenty_pct = DiscountValue::Percentage(Rate::from_bps(2000));
        assert_eq!(twenty_pct.apply_to(Money::eur(1000)), Money::eur(800));
    }

    #[test]
    fn test_order_discount_below_threshold_is_exactly_zero() {
        let t = tier(5000, DiscountValue::Percentage(Rate::from_bps(1000)));
        assert!(!t.applicable_to(Money::eur(4999)));
        assert_eq!(t.discount_amount(Money::eur(4999)), Money::eur(0));

        assert!(t.applicable_to(Money::eur(5000)));
        assert_eq!(t.discount_amount(Money::eur(5000)), Money::eur(500));
    }

    #[test]
    fn test_best_tier_picks_highest_threshold_met() {
        let tiers = vec![
            tier(5000, DiscountValue::Percentage(Rate::from_bps(500))),
            tier(10000, DiscountValue::Percentage(Rate::from_bps(1000))),
        ];
        let today = day(2026, 6, 1);

        let best = OrderDiscount::best_tier(&tiers, Money::eur(12000), today).unwrap();
        assert_eq!(best.min_order_amount, Money::eur(10000));

        let best = OrderDiscount::best_tier(&tiers, Money::eur(7000), today).unwrap();
        assert_eq!(best.min_order_amount, Money::eur(5000));

        assert!(OrderDiscount::best_tier(&tiers, Money::eur(4000), today).is_none());
    }

    #[test]
    fn test_best_tier_skips_out_of_window_tiers() {
        let mut expired = tier(10000, DiscountValue::Percentage(Rate::from_bps(1000)));
        expired.terms.window =
            ValidityWindow::new(Some(day(2025, 1, 1)), Some(day(2025, 12, 31)));
        let tiers = vec![
            tier(5000, DiscountValue::Percentage(Rate::from_bps(500))),
            expired,
        ];

        let best = OrderDiscount::best_tier(&tiers, Money::eur(12000), day(2026, 6, 1)).unwrap();
        assert_eq!(best.min_order_amount, Money::eur(5000));
    }

    #[test]
    fn test_discount_value_serde_tagging() {
        let pct = DiscountValue::Percentage(Rate::from_bps(1500));
        let json = serde_json::to_string(&pct).unwrap();
        assert!(json.contains("\"kind\":\"percentage\""));

        let back: DiscountValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pct);

        let fixed = DiscountValue::Fixed(Money::from_cents(250, Currency::Eur));
        let json = serde_json::to_string(&fixed).unwrap();
        let back: DiscountValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fixed);
    }
}
