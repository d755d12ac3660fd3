//! # Rule Validation
//!
//! Field- and scope-level checks for the four discount rule families.
//!
//! Each `validate_*` function returns *every* problem it finds as a
//! `Vec<ValidationError>` - an empty vec means the record is admissible.
//! Persistence runs these inside its write transaction so the overlap checks
//! race with nothing.
//!
//! Overlap rules by family:
//! - product discounts:           no overlap check (several may coexist)
//! - customer discounts:          at most one in-force window per customer
//! - customer-product discounts:  at most one per (customer, product) pair
//! - order discounts:             no overlap check (tiers coexist by design)

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Rate;
use crate::rules::{
    CustomerDiscount, CustomerProductDiscount, DiscountTerms, DiscountValue, OrderDiscount,
    ProductDiscount, ValidityWindow,
};

// =============================================================================
// Shared Checks
// =============================================================================

/// Checks every rule family shares: the value must be admissible for its
/// kind, and the window bounds must be ordered.
pub fn validate_terms(terms: &DiscountTerms) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_value(&terms.value, &mut errors);
    validate_window(&terms.window, &mut errors);
    errors
}

fn validate_value(value: &DiscountValue, errors: &mut Vec<ValidationError>) {
    match value {
        DiscountValue::Percentage(rate) => {
            if rate.is_zero() || *rate > Rate::ONE {
                errors.push(ValidationError::PercentageOutOfRange {
                    field: "discount_value",
                });
            }
        }
        DiscountValue::Fixed(amount) => {
            if !amount.is_positive() {
                errors.push(ValidationError::MustBePositive {
                    field: "discount_value",
                });
            }
        }
    }
}

fn validate_window(window: &ValidityWindow, errors: &mut Vec<ValidationError>) {
    if !window.bounds_ordered() {
        errors.push(ValidationError::EndsBeforeStart {
            field: "valid_until",
        });
    }
}

/// Overlap scan against sibling windows, skipping the candidate itself so
/// updates do not collide with their own stored row.
fn overlaps_any<'a, I>(candidate_id: &str, window: &ValidityWindow, siblings: I) -> bool
where
    I: IntoIterator<Item = (&'a str, &'a ValidityWindow, bool)>,
{
    siblings
        .into_iter()
        .any(|(id, other, active)| id != candidate_id && active && window.overlaps(other))
}

// =============================================================================
// Per-Family Validation
// =============================================================================

/// Product discounts carry a quantity gate but no overlap constraint.
pub fn validate_product_discount(
    candidate: &ProductDiscount,
    product_min_quantity: i64,
) -> Vec<ValidationError> {
    let mut errors = validate_terms(&candidate.terms);

    if candidate.min_quantity < 1 {
        errors.push(ValidationError::MustBePositive {
            field: "min_quantity",
        });
    } else if candidate.min_quantity < product_min_quantity {
        errors.push(ValidationError::BelowProductMinimum {
            field: "min_quantity",
            min: product_min_quantity,
        });
    }

    errors
}

/// Customer-wide discounts: shared checks plus the one-in-force-window-per-
/// customer overlap rule. `siblings` must be the customer's other active
/// rules; pass them from inside the write transaction.
pub fn validate_customer_discount(
    candidate: &CustomerDiscount,
    siblings: &[CustomerDiscount],
) -> Vec<ValidationError> {
    let mut errors = validate_terms(&candidate.terms);

    let windows = siblings
        .iter()
        .filter(|s| s.customer_id == candidate.customer_id)
        .map(|s| (s.id.as_str(), &s.terms.window, s.terms.active));
    if overlaps_any(&candidate.id, &candidate.terms.window, windows) {
        errors.push(ValidationError::ScopeOverlap {
            field: "validity period",
            scope: "customer",
        });
    }

    errors
}

/// Customer-product discounts: shared checks, the per-(customer, product)
/// overlap rule, and - on creation only - a guard against windows that are
/// already over. Updates skip the past-date check so an expired rule can
/// still be edited (deactivated, annotated) without tripping it.
pub fn validate_customer_product_discount(
    candidate: &CustomerProductDiscount,
    siblings: &[CustomerProductDiscount],
    today: NaiveDate,
    is_create: bool,
) -> Vec<ValidationError> {
    let mut errors = validate_terms(&candidate.terms);

    if is_create {
        if let Some(from) = candidate.terms.window.from {
            if from < today {
                errors.push(ValidationError::DateInPast {
                    field: "valid_from",
                });
            }
        }
        if let Some(until) = candidate.terms.window.until {
            if until < today {
                errors.push(ValidationError::DateInPast {
                    field: "valid_until",
                });
            }
        }
    }

    let windows = siblings
        .iter()
        .filter(|s| {
            s.customer_id == candidate.customer_id && s.product_id == candidate.product_id
        })
        .map(|s| (s.id.as_str(), &s.terms.window, s.terms.active));
    if overlaps_any(&candidate.id, &candidate.terms.window, windows) {
        errors.push(ValidationError::ScopeOverlap {
            field: "validity period",
            scope: "customer and product",
        });
    }

    errors
}

/// Order tiers: shared checks plus a positive threshold. Tiers deliberately
/// have no overlap rule - the resolver picks the best qualifying one.
pub fn validate_order_discount(candidate: &OrderDiscount) -> Vec<ValidationError> {
    let mut errors = validate_terms(&candidate.terms);

    if !candidate.min_order_amount.is_positive() {
        errors.push(ValidationError::MustBePositive {
            field: "min_order_amount",
        });
    }

    errors
}

// =============================================================================
// Unit Tests
// =============================================================================
