//! Monetary amounts and percentage discounts.
//!
//! Amounts are kept in minor currency units (cents) so cart totals are exact
//! sums; discounts are kept in basis points so fractional percentages survive
//! serialization without floating point.

use core::fmt;
use core::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Non-negative amount of money in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole currency units (`from_major(100)` is `100.00`).
    pub fn from_major(major: u64) -> DomainResult<Self> {
        major
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| DomainError::validation("amount is too large"))
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    /// `self × quantity`, failing instead of wrapping.
    pub fn times(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(u64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invalid_state("amount overflow"))
    }

    pub fn saturating_times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(quantity)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

/// Percentage discount, stored in basis points (`10%` is `1000`).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Discount(u16);

impl Discount {
    pub const NONE: Discount = Discount(0);
    pub const MAX_BASIS_POINTS: u16 = 10_000;

    pub fn from_basis_points(bp: u16) -> DomainResult<Self> {
        if bp > Self::MAX_BASIS_POINTS {
            return Err(DomainError::validation(
                "discount cannot exceed 100 percent",
            ));
        }
        Ok(Self(bp))
    }

    pub fn from_percent(percent: u16) -> DomainResult<Self> {
        let bp = percent
            .checked_mul(100)
            .ok_or_else(|| DomainError::validation("discount cannot exceed 100 percent"))?;
        Self::from_basis_points(bp)
    }

    pub const fn basis_points(self) -> u16 {
        self.0
    }

    /// Price after the discount: `price − price × discount / 100`,
    /// with the reduction rounded half-up to the nearest minor unit.
    pub fn apply(self, price: Money) -> Money {
        let reduction = (u128::from(price.minor()) * u128::from(self.0) + 5_000) / 10_000;
        // reduction <= price because basis points never exceed 10_000.
        Money::from_minor(price.minor() - reduction as u64)
    }
}

impl TryFrom<u16> for Discount {
    type Error = DomainError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_basis_points(value)
    }
}

impl From<Discount> for u16 {
    fn from(value: Discount) -> Self {
        value.0
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ten_percent_off_one_hundred_is_ninety() {
        let price = Money::from_major(100).unwrap();
        let special = Discount::from_percent(10).unwrap().apply(price);
        assert_eq!(special, Money::from_minor(9_000));
        assert_eq!(special.to_string(), "90.00");
    }

    #[test]
    fn reduction_rounds_half_up() {
        // 0.05 at 50% is 0.025 off, rounded to 0.03 off.
        let special = Discount::from_percent(50).unwrap().apply(Money::from_minor(5));
        assert_eq!(special, Money::from_minor(2));
    }

    #[test]
    fn discount_above_one_hundred_percent_is_rejected() {
        let err = Discount::from_percent(101).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("cannot exceed 100 percent") => {}
            _ => panic!("Expected validation error for discount > 100%"),
        }
        assert!(serde_json::from_str::<Discount>("10001").is_err());
    }

    #[test]
    fn times_reports_overflow_as_invalid_state() {
        let err = Money::from_minor(u64::MAX).times(2).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_minor(18_000).to_string(), "180.00");
        assert_eq!(Money::from_minor(7).to_string(), "0.07");
        assert_eq!(Discount::from_basis_points(1250).unwrap().to_string(), "12.50%");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 1000,
            ..ProptestConfig::default()
        })]

        /// Property: a discounted price never exceeds the list price.
        #[test]
        fn special_price_never_exceeds_price(
            minor in 0u64..1_000_000_000_000u64,
            bp in 0u16..=10_000u16
        ) {
            let price = Money::from_minor(minor);
            let special = Discount::from_basis_points(bp).unwrap().apply(price);
            prop_assert!(special <= price);
        }

        /// Property: zero discount is the identity, full discount is free.
        #[test]
        fn discount_bounds(minor in 0u64..1_000_000_000_000u64) {
            let price = Money::from_minor(minor);
            prop_assert_eq!(Discount::NONE.apply(price), price);
            prop_assert_eq!(Discount::from_percent(100).unwrap().apply(price), Money::ZERO);
        }
    }
}
