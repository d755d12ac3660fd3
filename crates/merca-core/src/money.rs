//! # Money Module
//!
//! Provides the `Money` and `Rate` types for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In many ordering systems:                                              │
//! │    €10.00 × 15% discount = €1.4999999…  → Who eats the missing cent?   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units + Basis Points                       │
//! │    1000 cents × 1500 bps = 150 cents, rounded half-up, exactly once    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use merca_core::money::{Money, Rate};
//!
//! // Create from cents (preferred)
//! let price = Money::eur(1099); // €10.99
//!
//! // Apply a 20% discount rate
//! let off = price.apply_rate(Rate::from_bps(2000)); // €2.20
//!
//! // Arithmetic operations
//! let net = price - off; // €8.79
//! assert_eq!(net.cents(), 879);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Currency
// =============================================================================

/// Currency tag carried by every monetary value.
///
/// There is no conversion between currencies anywhere in the core: an
/// organisation operates in exactly one currency, and mixing tags in
/// arithmetic is a programming error (debug-asserted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Currency {
    /// Euro (minor unit: cent).
    Eur,
    /// US Dollar (minor unit: cent).
    Usd,
}

impl Currency {
    /// ISO 4217 code for display and persistence.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }

    /// Symbol used by the Display impl.
    pub const fn symbol(&self) -> &'static str {
        match self {
            Currency::Eur => "€",
            Currency::Usd => "$",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Eur
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents), plus a currency tag.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative intermediate values (discounts, refunds)
/// - **Copy**: Two machine words, cheaper to copy than to borrow
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► Resolver (stacked / best-exclusive savings)          │
/// │                        │                                                │
/// │                        ▼                                                │
/// │  OrderItem.unit_price ──► line_total ──► Order subtotal                 │
/// │                                              │                          │
/// │  subtotal ──► tier discount ──► manual ──► tax ──► shipping ──► total   │
/// │                                                                         │
/// │  EVERY monetary value in the system flows through this type            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money {
    cents: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units (cents).
    #[inline]
    pub const fn from_cents(cents: i64, currency: Currency) -> Self {
        Money { cents, currency }
    }

    /// Shorthand for euro amounts, the platform default.
    ///
    /// ## Example
    /// ```rust
    /// use merca_core::money::Money;
    ///
    /// let price = Money::eur(1099); // €10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn eur(cents: i64) -> Self {
        Money::from_cents(cents, Currency::Eur)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency tag.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money::from_cents(0, currency)
    }

    /// Zero in the same currency as `self`.
    #[inline]
    pub const fn zeroed(&self) -> Self {
        Money::from_cents(0, self.currency)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Clamps the value at zero: negative amounts become zero.
    ///
    /// Discount arithmetic may momentarily dip below zero (a fixed reduction
    /// larger than the remaining price); customer-facing prices floor at zero
    /// rather than go negative.
    ///
    /// ## Example
    /// ```rust
    /// use merca_core::money::Money;
    ///
    /// let over_discounted = Money::eur(500) - Money::eur(800);
    /// assert_eq!(over_discounted.floor_zero().cents(), 0);
    /// ```
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.cents < 0 {
            self.zeroed()
        } else {
            *self
        }
    }

    /// Returns the smaller of two amounts (same currency).
    #[inline]
    pub fn min(self, other: Money) -> Money {
        debug_assert_eq!(self.currency, other.currency);
        if self.cents <= other.cents {
            self
        } else {
            other
        }
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use merca_core::money::Money;
    ///
    /// let unit_price = Money::eur(299); // €2.99
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897); // €8.97
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money::from_cents(self.cents * qty, self.currency)
    }

    /// Applies a rate and returns the resulting *portion* (not the remainder).
    ///
    /// ## Implementation
    /// Integer math with half-up rounding: `(cents * bps + 5000) / 10000`.
    /// i128 intermediates prevent overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use merca_core::money::{Money, Rate};
    ///
    /// let subtotal = Money::eur(1000);           // €10.00
    /// let tax = subtotal.apply_rate(Rate::from_bps(825)); // 8.25%
    /// assert_eq!(tax.cents(), 83);               // €0.83 (82.5 rounds up)
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.cents as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(cents as i64, self.currency)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for debugging and logs. The storefront formats amounts itself
/// to handle localization properly.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(
            f,
            "{}{}{}.{:02}",
            sign,
            self.currency.symbol(),
            abs / 100,
            abs % 100
        )
    }
}

/// Addition of two Money values (same currency).
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Money::from_cents(self.cents + other.cents, self.currency)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        debug_assert_eq!(self.currency, other.currency);
        self.cents += other.cents;
    }
}

/// Subtraction of two Money values (same currency).
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        debug_assert_eq!(self.currency, other.currency);
        Money::from_cents(self.cents - other.cents, self.currency)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        debug_assert_eq!(self.currency, other.currency);
        self.cents -= other.cents;
    }
}

/// Multiplication by i64 (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money::from_cents(self.cents * qty, self.currency)
    }
}

// =============================================================================
// Rate Type
// =============================================================================

/// A fraction represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. Four decimal places cover every rate the
/// platform stores, so a u32 of bps loses nothing while keeping the core free
/// of floating point. Used for discount percentages, tax rates, and
/// effective-discount reporting.
///
/// `Rate::ONE` (10 000 bps) is 100%.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 0%.
    pub const ZERO: Rate = Rate(0);

    /// 100%.
    pub const ONE: Rate = Rate(10_000);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience in tests and seeds).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Computes `part / whole` as a rate, rounded half-up to the nearest bp.
    ///
    /// A zero `whole` yields `Rate::ZERO` — the zero-price degeneracy must
    /// never surface as a division error (resolution always returns a value).
    ///
    /// ## Example
    /// ```rust
    /// use merca_core::money::{Money, Rate};
    ///
    /// let savings = Money::eur(300);
    /// let base = Money::eur(1000);
    /// assert_eq!(Rate::ratio(savings, base), Rate::from_bps(3000)); // 30%
    /// assert_eq!(Rate::ratio(savings, Money::eur(0)), Rate::ZERO);
    /// ```
    pub fn ratio(part: Money, whole: Money) -> Rate {
        if whole.cents() <= 0 {
            return Rate::ZERO;
        }
        let bps = (part.cents() as i128 * 10_000 + whole.cents() as i128 / 2)
            / whole.cents() as i128;
        Rate(bps.clamp(0, 10_000) as u32)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percentage())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
