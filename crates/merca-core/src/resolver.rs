//! # Discount Resolver
//!
//! Turns the rules in force for one (product, customer, quantity) into a
//! single effective price. This module is pure: callers fetch the rules,
//! the resolver only does arithmetic.
//!
//! ## Resolution Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Discount Resolution                             │
//! │                                                                         │
//! │  1. COLLECT (fixed order)                                               │
//! │     product sales ──► customer×product price ──► customer tier          │
//! │          │                                                              │
//! │  2. PARTITION by stackable flag                                         │
//! │          │                                                              │
//! │     ┌────┴─────────────────┐                                            │
//! │     ▼                      ▼                                            │
//! │  STACKED               EXCLUSIVE                                        │
//! │  apply each in order   each competes alone against                      │
//! │  to the *remaining*    the ORIGINAL price; the one                      │
//! │  price, floor at 0     with the largest savings wins                    │
//! │     │                      │   (ties keep the first)                    │
//! │     └────────┬─────────────┘                                            │
//! │              ▼                                                          │
//! │  3. EFFECTIVE = stacked if stackedSavings ≥ bestExclusiveSavings        │
//! │                 else best exclusive                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Purchase vs Display
//! In [`PricingMode::Purchase`] a product sale below its quantity gate is
//! dropped entirely. In [`PricingMode::Display`] it still participates (the
//! product page advertises the sale price) and carries
//! `meets_min_quantity: false` so the UI can annotate the gate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};
use crate::rules::{
    CustomerDiscount, CustomerProductDiscount, DiscountValue, ProductDiscount,
};
use crate::types::ProductSnapshot;

// =============================================================================
// Labels
// =============================================================================

/// Storefront label for an in-force product sale.
pub const LABEL_PRODUCT_SALE: &str = "Product Sale";
/// Storefront label for a customer's negotiated product price.
pub const LABEL_SPECIAL_PRICE: &str = "Your Special Price";
/// Storefront label for a customer-wide tier.
pub const LABEL_CUSTOMER_TIER: &str = "Customer Tier Discount";
/// Storefront label when several stacked discounts combine.
pub const LABEL_COMBINED: &str = "Combined Discount";

// =============================================================================
// Inputs
// =============================================================================

/// Whether the caller is committing a purchase or rendering a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// Quantity gates filter candidates.
    Purchase,
    /// Quantity gates only annotate; every in-force rule participates.
    Display,
}

/// The rules in force that could touch one product for one customer.
/// Fetched by the repository layer, consumed here.
#[derive(Debug, Clone, Default)]
pub struct RuleSet<'a> {
    pub product: &'a [ProductDiscount],
    pub customer_product: &'a [CustomerProductDiscount],
    pub customer: &'a [CustomerDiscount],
}

/// What is being priced.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub product: &'a ProductSnapshot,
    /// None prices for an anonymous visitor: only product sales apply.
    pub customer_id: Option<&'a str>,
    pub quantity: i64,
    pub mode: PricingMode,
}

// =============================================================================
// Outputs
// =============================================================================

/// Which rule scope produced a candidate or the effective discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    Product,
    CustomerProduct,
    Customer,
    /// Several stacked candidates combined.
    Stacked,
}

impl DiscountSource {
    /// Storefront label for a single-source discount.
    pub const fn label(&self) -> &'static str {
        match self {
            DiscountSource::Product => LABEL_PRODUCT_SALE,
            DiscountSource::CustomerProduct => LABEL_SPECIAL_PRICE,
            DiscountSource::Customer => LABEL_CUSTOMER_TIER,
            DiscountSource::Stacked => LABEL_COMBINED,
        }
    }
}

/// One rule that survived collection, annotated for the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Candidate {
    pub source: DiscountSource,
    pub value: DiscountValue,
    pub stackable: bool,
    pub label: String,
    /// False only in display mode, for product sales below their gate.
    pub meets_min_quantity: bool,
    /// The gate itself, where one exists.
    pub min_quantity_required: Option<i64>,
    /// End of the window, for "offer ends ..." annotations.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
}

/// The discount that actually applies, reduced to reportable numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EffectiveDiscount {
    pub source: DiscountSource,
    pub label: String,
    /// Savings as a fraction of the base price (derived, for display).
    pub percentage: Rate,
    pub savings: Money,
}

/// Full result of resolving one pricing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountBreakdown {
    pub base_price: Money,
    pub candidates: Vec<Candidate>,
    pub effective: Option<EffectiveDiscount>,
    pub final_price: Money,
    pub savings: Money,
}

impl DiscountBreakdown {
    /// True when any discount actually reduced the price.
    pub fn has_discount(&self) -> bool {
        self.savings.is_positive()
    }

    fn undiscounted(base: Money, candidates: Vec<Candidate>) -> Self {
        DiscountBreakdown {
            base_price: base,
            candidates,
            effective: None,
            final_price: base,
            savings: base.zeroed(),
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves the effective discount for one pricing context.
///
/// Candidate order is fixed (product sales, then the customer's product
/// price, then the customer tier) and doubles as the tie-breaker among
/// exclusive candidates with equal savings.
pub fn resolve(ctx: &PricingContext<'_>, rules: &RuleSet<'_>, today: NaiveDate) -> DiscountBreakdown {
    let base = ctx.product.price;
    let candidates = collect_candidates(ctx, rules, today);

    if candidates.is_empty() || !base.is_positive() {
        return DiscountBreakdown::undiscounted(base, candidates);
    }

    // Stacked: each candidate bites on what the previous ones left.
    let mut remaining = base;
    let mut stacked_any = false;
    for candidate in candidates.iter().filter(|c| c.stackable) {
        remaining = candidate.value.apply_to(remaining);
        stacked_any = true;
    }
    let stacked_savings = base - remaining;

    // Exclusive: each competes alone against the original price.
    let best_exclusive = candidates
        .iter()
        .filter(|c| !c.stackable)
        .map(|c| (c, c.value.savings_on(base)))
        .fold(None::<(&Candidate, Money)>, |best, next| match best {
            // Strict comparison keeps the first of equals (collection order).
            Some((_, best_savings)) if next.1 > best_savings => Some(next),
            Some(best) => Some(best),
            None => Some(next),
        });

    let exclusive_savings = best_exclusive
        .map(|(_, savings)| savings)
        .unwrap_or_else(|| base.zeroed());

    // Ties favor stacking. The stacked result always carries the combined
    // label, even when only one stackable rule contributed.
    let effective = if stacked_any && stacked_savings >= exclusive_savings {
        Some(EffectiveDiscount {
            source: DiscountSource::Stacked,
            label: LABEL_COMBINED.to_string(),
            percentage: Rate::ratio(stacked_savings, base),
            savings: stacked_savings,
        })
    } else {
        best_exclusive.map(|(candidate, savings)| EffectiveDiscount {
            source: candidate.source,
            label: candidate.label.clone(),
            percentage: Rate::ratio(savings, base),
            savings,
        })
    };

    let savings = effective
        .as_ref()
        .map(|e| e.savings)
        .unwrap_or_else(|| base.zeroed());

    DiscountBreakdown {
        base_price: base,
        candidates,
        effective,
        final_price: (base - savings).floor_zero(),
        savings,
    }
}

/// Collects candidates in resolution order. Rules out of force today never
/// appear; quantity-gated product sales are dropped in purchase mode and
/// flagged in display mode.
fn collect_candidates(
    ctx: &PricingContext<'_>,
    rules: &RuleSet<'_>,
    today: NaiveDate,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for sale in rules.product.iter().filter(|r| r.terms.in_force(today)) {
        let meets = ctx.quantity >= sale.min_quantity;
        if !meets && ctx.mode == PricingMode::Purchase {
            continue;
        }
        candidates.push(Candidate {
            source: DiscountSource::Product,
            value: sale.terms.value,
            stackable: sale.terms.stackable,
            label: LABEL_PRODUCT_SALE.to_string(),
            meets_min_quantity: meets,
            min_quantity_required: Some(sale.min_quantity),
            valid_until: sale.terms.window.until,
        });
    }

    let Some(customer_id) = ctx.customer_id else {
        return candidates;
    };

    // Overlap validation guarantees at most one rule per scope is in force,
    // so "first in force" is "the one in force".
    if let Some(rule) = rules
        .customer_product
        .iter()
        .find(|r| r.customer_id == customer_id && r.terms.in_force(today))
    {
        candidates.push(Candidate {
            source: DiscountSource::CustomerProduct,
            value: rule.terms.value,
            stackable: rule.terms.stackable,
            label: LABEL_SPECIAL_PRICE.to_string(),
            meets_min_quantity: true,
            min_quantity_required: None,
            valid_until: rule.terms.window.until,
        });
    }

    if let Some(rule) = rules
        .customer
        .iter()
        .find(|r| r.customer_id == customer_id && r.terms.in_force(today))
    {
        candidates.push(Candidate {
            source: DiscountSource::Customer,
            value: rule.terms.value,
            stackable: rule.terms.stackable,
            label: LABEL_CUSTOMER_TIER.to_string(),
            meets_min_quantity: true,
            min_quantity_required: None,
            valid_until: rule.terms.window.until,
        });
    }

    candidates
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{DiscountTerms, ValidityWindow};
    use chrono::Utc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        day(2026, 6, 15)
    }

    fn snapshot(price_cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            price: Money::eur(price_cents),
            min_order_quantity: 1,
        }
    }

    fn terms(value: DiscountValue, stackable: bool) -> DiscountTerms {
        DiscountTerms {
            value,
            window: ValidityWindow::perpetual(),
            stackable,
            active: true,
        }
    }

    fn product_sale(value: DiscountValue, stackable: bool, min_quantity: i64) -> ProductDiscount {
        let now = Utc::now();
        ProductDiscount {
            id: "pd1".into(),
            organisation_id: "org1".into(),
            product_id: "prod1".into(),
            min_quantity,
            terms: terms(value, stackable),
            created_at: now,
            updated_at: now,
        }
    }

    fn customer_tier(value: DiscountValue, stackable: bool) -> CustomerDiscount {
        let now = Utc::now();
        CustomerDiscount {
            id: "cd1".into(),
            organisation_id: "org1".into(),
            customer_id: "cust1".into(),
            terms: terms(value, stackable),
            created_at: now,
            updated_at: now,
        }
    }

    fn special_price(value: DiscountValue, stackable: bool) -> CustomerProductDiscount {
        let now = Utc::now();
        CustomerProductDiscount {
            id: "cpd1".into(),
            organisation_id: "org1".into(),
            customer_id: "cust1".into(),
            product_id: "prod1".into(),
            terms: terms(value, stackable),
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx<'a>(product: &'a ProductSnapshot, quantity: i64, mode: PricingMode) -> PricingContext<'a> {
        PricingContext {
            product,
            customer_id: Some("cust1"),
            quantity,
            mode,
        }
    }

    fn pct(bps: u32) -> DiscountValue {
        DiscountValue::Percentage(Rate::from_bps(bps))
    }

    fn fixed(cents: i64) -> DiscountValue {
        DiscountValue::Fixed(Money::eur(cents))
    }

    #[test]
    fn test_no_candidates_is_identity() {
        let product = snapshot(1000);
        let breakdown = resolve(
            &ctx(&product, 1, PricingMode::Purchase),
            &RuleSet::default(),
            today(),
        );
        assert_eq!(breakdown.final_price, Money::eur(1000));
        assert_eq!(breakdown.savings, Money::eur(0));
        assert!(breakdown.effective.is_none());
        assert!(!breakdown.has_discount());
    }

    #[test]
    fn test_single_percentage_discount() {
        let product = snapshot(1000);
        let sales = [product_sale(pct(2000), true, 1)];
        let rules = RuleSet {
            product: &sales,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(800));
        assert_eq!(breakdown.savings, Money::eur(200));

        // The stacked path reports the combined label even for one rule;
        // the candidate list still carries the per-rule label for the UI.
        let effective = breakdown.effective.unwrap();
        assert_eq!(effective.source, DiscountSource::Stacked);
        assert_eq!(effective.label, LABEL_COMBINED);
        assert_eq!(effective.percentage, Rate::from_bps(2000));
        assert_eq!(breakdown.candidates[0].label, LABEL_PRODUCT_SALE);
    }

    #[test]
    fn test_stacking_applies_to_remaining_price() {
        // 20% then €1.00 fixed on €10.00: 1000 -> 800 -> 700
        let product = snapshot(1000);
        let sales = [product_sale(pct(2000), true, 1)];
        let tiers = [customer_tier(fixed(100), true)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(700));
        assert_eq!(breakdown.savings, Money::eur(300));

        let effective = breakdown.effective.unwrap();
        assert_eq!(effective.source, DiscountSource::Stacked);
        assert_eq!(effective.label, LABEL_COMBINED);
    }

    #[test]
    fn test_best_exclusive_wins_by_absolute_savings() {
        // 10% (€1.00) vs €0.50 fixed on €10.00: the percentage wins
        let product = snapshot(1000);
        let sales = [product_sale(pct(1000), false, 1)];
        let tiers = [customer_tier(fixed(50), false)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(900));
        assert_eq!(breakdown.effective.unwrap().source, DiscountSource::Product);
    }

    #[test]
    fn test_exclusive_tie_keeps_first_collected() {
        // Product sale and customer tier both save €1.00; product collected first
        let product = snapshot(1000);
        let sales = [product_sale(pct(1000), false, 1)];
        let tiers = [customer_tier(fixed(100), false)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.effective.unwrap().source, DiscountSource::Product);
    }

    #[test]
    fn test_tie_between_stacked_and_exclusive_favors_stacking() {
        let product = snapshot(1000);
        let sales = [product_sale(fixed(200), true, 1)];
        let tiers = [customer_tier(fixed(200), false)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        let effective = breakdown.effective.unwrap();
        assert_eq!(effective.source, DiscountSource::Stacked); // not the exclusive tier
        assert_eq!(breakdown.final_price, Money::eur(800));
    }

    #[test]
    fn test_exclusive_beats_smaller_stack() {
        // Stacked €0.50 vs exclusive 50% (€5.00)
        let product = snapshot(1000);
        let sales = [product_sale(fixed(50), true, 1)];
        let specials = [special_price(pct(5000), false)];
        let rules = RuleSet {
            product: &sales,
            customer_product: &specials,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(500));
        let effective = breakdown.effective.unwrap();
        assert_eq!(effective.source, DiscountSource::CustomerProduct);
        assert_eq!(effective.label, LABEL_SPECIAL_PRICE);
    }

    #[test]
    fn test_fixed_discount_floors_at_zero() {
        let product = snapshot(300);
        let sales = [product_sale(fixed(500), true, 1)];
        let rules = RuleSet {
            product: &sales,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(0));
        assert_eq!(breakdown.savings, Money::eur(300));
    }

    #[test]
    fn test_quantity_gate_filters_in_purchase_mode() {
        let product = snapshot(1000);
        let sales = [product_sale(pct(2000), true, 10)];
        let rules = RuleSet {
            product: &sales,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 5, PricingMode::Purchase), &rules, today());
        assert!(breakdown.candidates.is_empty());
        assert_eq!(breakdown.final_price, Money::eur(1000));

        let breakdown = resolve(&ctx(&product, 10, PricingMode::Purchase), &rules, today());
        assert_eq!(breakdown.final_price, Money::eur(800));
    }

    #[test]
    fn test_quantity_gate_annotates_in_display_mode() {
        let product = snapshot(1000);
        let sales = [product_sale(pct(2000), true, 10)];
        let rules = RuleSet {
            product: &sales,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Display), &rules, today());
        assert_eq!(breakdown.candidates.len(), 1);
        assert!(!breakdown.candidates[0].meets_min_quantity);
        assert_eq!(breakdown.candidates[0].min_quantity_required, Some(10));
        // The sale price is still advertised
        assert_eq!(breakdown.final_price, Money::eur(800));
    }

    #[test]
    fn test_anonymous_visitor_gets_product_sales_only() {
        let product = snapshot(1000);
        let sales = [product_sale(pct(1000), true, 1)];
        let tiers = [customer_tier(pct(5000), true)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let anonymous = PricingContext {
            product: &product,
            customer_id: None,
            quantity: 1,
            mode: PricingMode::Purchase,
        };
        let breakdown = resolve(&anonymous, &rules, today());
        assert_eq!(breakdown.candidates.len(), 1);
        assert_eq!(breakdown.final_price, Money::eur(900));
    }

    #[test]
    fn test_out_of_window_rules_never_surface() {
        let product = snapshot(1000);
        let mut sale = product_sale(pct(2000), true, 1);
        sale.terms.window = ValidityWindow::new(Some(day(2025, 1, 1)), Some(day(2025, 12, 31)));
        let sales = [sale];
        let rules = RuleSet {
            product: &sales,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert!(breakdown.candidates.is_empty());
        assert_eq!(breakdown.final_price, Money::eur(1000));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let product = snapshot(1234);
        let sales = [product_sale(pct(1500), true, 1)];
        let tiers = [customer_tier(fixed(73), true)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let context = ctx(&product, 3, PricingMode::Purchase);
        let first = resolve(&context, &rules, today());
        let second = resolve(&context, &rules, today());
        assert_eq!(first, second);
    }

    #[test]
    fn test_final_price_plus_savings_equals_base() {
        let product = snapshot(999);
        let sales = [product_sale(pct(3333), true, 1)];
        let tiers = [customer_tier(fixed(111), true)];
        let rules = RuleSet {
            product: &sales,
            customer: &tiers,
            ..Default::default()
        };

        let breakdown = resolve(&ctx(&product, 1, PricingMode::Purchase), &rules, today());
        assert_eq!(
            breakdown.final_price + breakdown.savings,
            breakdown.base_price
        );
    }
}
