//! # Core Error Types
//!
//! Domain errors for the pricing core. Field-level validation failures are a
//! separate, non-fatal type ([`ValidationError`]) so callers can collect every
//! problem on a record and report them together instead of failing on the
//! first one.

use thiserror::Error;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Fatal domain errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Attempt to mutate an order that has already been placed.
    #[error("Order {order_id} has already been placed and cannot be modified")]
    AlreadyPlaced { order_id: String },

    /// Disallowed state-machine transition.
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// A single validation failure surfaced as a hard error.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One field-level validation failure on a discount rule or order.
///
/// Display strings are user-facing and keyed by field name, so a caller can
/// render them next to the offending input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be greater than 0")]
    MustBePositive { field: &'static str },

    #[error("{field} must be between 0 and 1 for percentage discounts")]
    PercentageOutOfRange { field: &'static str },

    #[error("{field} must be after valid from date")]
    EndsBeforeStart { field: &'static str },

    #[error("{field} cannot be in the past")]
    DateInPast { field: &'static str },

    #[error("{field} cannot be less than the product's minimum order quantity ({min})")]
    BelowProductMinimum { field: &'static str, min: i64 },

    #[error("{field} overlaps with an existing discount for this {scope}")]
    ScopeOverlap {
        field: &'static str,
        scope: &'static str,
    },
}
