//! # Money Module
//!
//! Integer money plus the two quantities weighed items are priced with.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │    0.350 kg × 0.0599/g = 20.964999…  ❌                                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer units everywhere                                │
//! │    Money     → cents                                                    │
//! │    Weight    → grams                                                    │
//! │    GramRate  → milli-cents per gram (= cents per kilogram)             │
//! │                                                                         │
//! │    350 g × 5990 m¢/g = 2_096_500 m¢ → 2097 ¢ (half-up)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: discounts and change are computed by subtraction
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// LineItem.unit_price ──► LineItem.subtotal ──► Cart.total()
///                                                   │
///                                  Sale.subtotal ◄──┘
///                                  Sale.total = subtotal − discount
///                                                   │
///                                  CashEntry.amount ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tableside_core::money::Money;
    ///
    /// let price = Money::from_cents(2590);
    /// assert_eq!(price.cents(), 2590);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Note
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use tableside_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(1000);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 3000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

/// Plain decimal rendering for logs and descriptions.
///
/// Currency symbols and locale formatting belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Weight
// =============================================================================

/// Weight of a weighed line item, in whole grams.
///
/// Scales report grams; kilograms only exist for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Weight(i64);

impl Weight {
    #[inline]
    pub const fn from_grams(grams: i64) -> Self {
        Weight(grams)
    }

    #[inline]
    pub const fn grams(&self) -> i64 {
        self.0
    }

    /// Kilograms as a float, for display only.
    #[inline]
    pub fn kilograms(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}kg", self.0 / 1000, (self.0 % 1000).abs())
    }
}

// =============================================================================
// Gram Rate
// =============================================================================

/// Price per gram, stored as milli-cents per gram.
///
/// One milli-cent per gram is exactly one cent per kilogram, so menu prices
/// quoted per kilo convert without loss:
///
/// ```rust
/// use tableside_core::money::{GramRate, Money};
///
/// let rate = GramRate::from_price_per_kg(Money::from_cents(5990)); // 59.90/kg
/// assert_eq!(rate.millicents(), 5990);                             // 0.0599/g
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GramRate(i64);

impl GramRate {
    #[inline]
    pub const fn from_millicents(millicents: i64) -> Self {
        GramRate(millicents)
    }

    /// Builds the per-gram rate from a per-kilogram price.
    #[inline]
    pub const fn from_price_per_kg(price: Money) -> Self {
        GramRate(price.cents())
    }

    #[inline]
    pub const fn millicents(&self) -> i64 {
        self.0
    }

    /// The equivalent per-kilogram price.
    #[inline]
    pub const fn price_per_kg(&self) -> Money {
        Money::from_cents(self.0)
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Prices a weight: `weight_kg × 1000 × price_per_gram`.
    ///
    /// Computed in milli-cents and rounded half-up to the cent. The product
    /// is taken in i128; a result past i64 saturates instead of wrapping.
    ///
    /// ## Example
    /// ```rust
    /// use tableside_core::money::{GramRate, Money, Weight};
    ///
    /// let rate = GramRate::from_price_per_kg(Money::from_cents(5990));
    /// assert_eq!(rate.price(Weight::from_grams(500)).cents(), 2995);
    /// assert_eq!(rate.price(Weight::from_grams(350)).cents(), 2097); // 2096.5 → 2097
    /// ```
    pub fn price(&self, weight: Weight) -> Money {
        let millicents = weight.grams() as i128 * self.0 as i128;
        let cents = (millicents + 500) / 1000;
        let clamped = if cents < 0 { i64::MIN } else { i64::MAX };
        Money::from_cents(i64::try_from(cents).unwrap_or(clamped))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
