//! Money value objects.
//!
//! Amounts are integer minor units. Catalog prices carry two extra digits so
//! a menu price such as `0.125` survives until a line subtotal is rounded.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    /// The input is not a decimal number.
    #[error("Invalid amount: {0:?}")]
    Invalid(String),

    /// The amount does not fit the internal representation.
    #[error("Amount out of range: {0}")]
    OutOfRange(String),
}

fn parse_scaled(input: &str, scale: u32) -> Result<i64, MoneyParseError> {
    let trimmed = input.trim();
    let decimal =
        Decimal::from_str(trimmed).map_err(|_| MoneyParseError::Invalid(trimmed.to_string()))?;
    let mut rounded = decimal.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(scale);
    i64::try_from(rounded.mantissa()).map_err(|_| MoneyParseError::OutOfRange(trimmed.to_string()))
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Parses a decimal string such as `"12.5"`, rounding half-up at the cent.
    pub fn parse(input: &str) -> Result<Self, MoneyParseError> {
        parse_scaled(input, 2).map(Self::from_cents)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Adds another amount, returning `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Renders the amount as a plain decimal string with two digits, e.g. `"19.75"`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        format!("{sign}{}", self.unsigned_decimal())
    }

    fn unsigned_decimal(&self) -> String {
        let abs = self.cents.unsigned_abs();
        format!("{}.{:02}", abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        write!(f, "{sign}${}", self.unsigned_decimal())
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Catalog unit price in ten-thousandths of the currency unit.
///
/// Four decimal places leave room for sub-cent menu prices; a line subtotal
/// is rounded to the cent only once the quantity is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitPrice(i64);

impl UnitPrice {
    const SCALE: u32 = 4;

    /// Creates a unit price from ten-thousandths (e.g., 125_000 = 12.50).
    pub fn from_ten_thousandths(value: i64) -> Self {
        Self(value)
    }

    /// Creates a unit price from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents * 100)
    }

    /// Parses a decimal string, rounding half-up at the fourth decimal place.
    pub fn parse(input: &str) -> Result<Self, MoneyParseError> {
        parse_scaled(input, Self::SCALE).map(Self)
    }

    /// Returns the raw value in ten-thousandths.
    pub fn ten_thousandths(&self) -> i64 {
        self.0
    }

    /// Returns true if the price is below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Price of `quantity` units rounded half-up at the cent.
    ///
    /// Returns `None` when the result leaves the `i64` cent range. Negative
    /// prices round toward negative infinity at the midpoint; callers reject
    /// them before pricing.
    pub fn extend(&self, quantity: u32) -> Option<Money> {
        let raw = i128::from(self.0) * i128::from(quantity);
        let cents = (raw + 50).div_euclid(100);
        i64::try_from(cents).ok().map(Money::from_cents)
    }

    /// Renders the price with at least two decimals, e.g. `"12.50"` or `"0.125"`.
    pub fn to_decimal_string(&self) -> String {
        let mut decimal = Decimal::new(self.0, Self::SCALE).normalize();
        if decimal.scale() < 2 {
            decimal.rescale(2);
        }
        decimal.to_string()
    }
}

impl std::fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.to_decimal_string())
    }
}
