//! Monetary arithmetic using decimal values.
//!
//! Every figure that lands on an order is rounded to two decimal places at the
//! boundary where it is aggregated. Amounts exchanged with the payment provider
//! travel as integer minor units (paise for INR), never as decimals.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Decimal places kept on every stored monetary figure.
pub const MONEY_SCALE: u32 = 2;

/// Errors raised when converting between decimal and minor-unit amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// The amount does not fit in an `i64` count of minor units.
    #[error("amount {0} is out of range for minor-unit conversion")]
    OutOfRange(Decimal),
    /// Provider amounts are never negative.
    #[error("amount {0} is negative")]
    Negative(Decimal),
}

/// Round a monetary amount to two decimal places, half away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a decimal amount to integer minor units (e.g. `286.50` -> `28650`).
///
/// # Errors
///
/// Returns `MoneyError::Negative` for negative input and
/// `MoneyError::OutOfRange` when the result does not fit in `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyError::OutOfRange(amount))
}

/// Convert integer minor units back to a decimal amount.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MONEY_SCALE)
}

/// ISO 4217 currency codes accepted by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The three-letter code sent to the provider.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(12_345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_money(Decimal::new(12_344, 3)), Decimal::new(1234, 2));
        assert_eq!(round_money(Decimal::from(36)), Decimal::from(36));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from(286)).unwrap(), 28_600);
        assert_eq!(to_minor_units(Decimal::new(28_650, 2)).unwrap(), 28_650);
        assert_eq!(to_minor_units(Decimal::new(10_005, 3)).unwrap(), 1_001);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert!(matches!(
            to_minor_units(Decimal::new(-1, 2)),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units(28_650), Decimal::new(28_650, 2));
        assert_eq!(from_minor_units(0), Decimal::ZERO);
        assert_eq!(from_minor_units(-5), Decimal::new(-5, 2));
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::INR.to_string(), "INR");
    }
}
