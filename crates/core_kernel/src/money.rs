//! Money types with precise decimal arithmetic
//!
//! This module provides a type-safe representation of monetary values
//! using rust_decimal for precise calculations without floating-point errors.
//!
//! All rounding performed by the coverage engine goes through this module.
//! Amounts are rounded to two decimal places with midpoint-away-from-zero;
//! tariff prices derived from multiplicative factors are rounded to whole
//! currency units instead.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of decimal places every engine amount is expressed in
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid percentage: {0} (expected a value between 0 and 100)")]
    InvalidPercentage(Decimal),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount
///
/// Construction never rounds, so a value read from storage keeps whatever
/// precision it was saved with and the tariff validator can report it.
/// Arithmetic that introduces new digits (`apply_percent`, `rounded`) rounds
/// to [`MONEY_DECIMAL_PLACES`] using midpoint-away-from-zero. There are no
/// operator impls: every sum or difference goes through a `checked_*` method
/// and reports `MoneyError::Overflow` past `Decimal::MAX`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    amount: Decimal,
}

impl Money {
    /// Wraps an amount as-is
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }

    /// Wraps an amount rounded to two decimal places
    pub fn rounded(amount: Decimal) -> Self {
        Self {
            amount: round_money(amount),
        }
    }

    /// Creates Money from an integer amount in minor units (cents)
    pub fn from_minor(minor_units: i64) -> Self {
        Self {
            amount: Decimal::new(minor_units, MONEY_DECIMAL_PLACES),
        }
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self { amount: dec!(0) }
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
        }
    }

    /// Rounds to two decimal places (midpoint away from zero)
    pub fn round(&self) -> Self {
        Self::rounded(self.amount)
    }

    /// Rounds to the smallest currency unit (no decimals)
    ///
    /// Only tariff prices derived from multiplicative factors use this.
    pub fn round_to_unit(&self) -> Self {
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        }
    }

    /// Returns true if the amount carries no more than two decimal places
    pub fn is_at_precision(&self) -> bool {
        self.amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::ToZero)
            == self.amount
    }

    /// Clamps negative amounts to zero
    pub fn max_zero(&self) -> Self {
        if self.is_negative() {
            Self::zero()
        } else {
            *self
        }
    }

    /// Applies a percentage and rounds the result to two decimal places
    pub fn apply_percent(&self, percent: Percentage) -> Result<Self, MoneyError> {
        self.amount
            .checked_mul(percent.value())
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .map(Self::rounded)
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by a scalar without rounding
    pub fn multiply(&self, factor: Decimal) -> Result<Self, MoneyError> {
        self.amount
            .checked_mul(factor)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked addition
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.amount
            .checked_add(other.amount)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.amount
            .checked_sub(other.amount)
            .map(Self::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Adds up amounts, failing instead of wrapping past `Decimal::MAX`
    pub fn checked_sum<'a, I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount))
    }

    /// Returns this amount as a percentage of `total`
    pub fn percent_of(&self, total: &Money) -> Result<Decimal, MoneyError> {
        if total.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        self.amount
            .checked_mul(dec!(100))
            .and_then(|scaled| scaled.checked_div(total.amount))
            .ok_or(MoneyError::Overflow)
    }
}

/// Rounds a raw decimal to money precision
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.amount)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

/// A percentage between 0 and 100 inclusive (e.g. 70 for 70%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage {
    value: Decimal,
}

impl Percentage {
    /// 0%
    pub const ZERO: Percentage = Percentage { value: Decimal::ZERO };

    /// 100%
    pub const FULL: Percentage = Percentage {
        value: Decimal::ONE_HUNDRED,
    };

    /// Creates a percentage, rejecting values outside [0, 100]
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(MoneyError::InvalidPercentage(value));
        }
        Ok(Self { value })
    }

    /// Creates a percentage, clamping the value into [0, 100]
    pub fn clamped(value: Decimal) -> Self {
        Self {
            value: value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
        }
    }

    /// Returns the percentage value (e.g. 70 for 70%)
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns true for 100%
    pub fn is_full(&self) -> bool {
        self.value == Decimal::ONE_HUNDRED
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(percent: Percentage) -> Decimal {
        percent.value
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.value)
    }
}
