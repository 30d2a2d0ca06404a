//! Amount - Fixed-point decimal with exactly 7 fractional digits
//!
//! Every balance, delta and fee in Horizon goes through this type.
//! One stroop is the smallest unit: 0.0000001.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by every amount
pub const SCALE: u32 = 7;

/// Errors that can occur when building amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount has more than 7 decimal places: {0}")]
    TooPrecise(Decimal),

    #[error("Amount out of range: {0}")]
    OutOfRange(Decimal),

    #[error("Invalid amount: {0}")]
    Invalid(String),
}

/// A signed scale-7 fixed-point amount.
///
/// # Invariant
/// The inner value always has scale 7 and its magnitude fits in an
/// `i64` number of stroops.
///
/// # Example
/// ```
/// use horizon_core::Amount;
///
/// let amount: Amount = "100.5".parse().unwrap();
/// assert_eq!(amount.to_string(), "100.5000000");
///
/// // More than 7 decimals is rejected
/// assert!("0.00000001".parse::<Amount>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Zero amount constant
    pub const ZERO: Self = Self(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Create a new Amount from a Decimal, rescaling to 7 places.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        let normalized = value.normalize();
        if normalized.scale() > SCALE {
            return Err(AmountError::TooPrecise(value));
        }

        let max = Decimal::new(i64::MAX, SCALE);
        if normalized.abs() > max {
            return Err(AmountError::OutOfRange(value));
        }

        let mut scaled = normalized;
        scaled.rescale(SCALE);
        Ok(Self(scaled))
    }

    /// Build an amount from an integer number of stroops
    pub fn from_stroops(stroops: i64) -> Self {
        Self(Decimal::new(stroops, SCALE))
    }

    /// Integer number of stroops
    pub fn to_stroops(&self) -> i64 {
        // Invariant: scale is 7 and magnitude fits i64
        i64::try_from(self.0.mantissa()).unwrap_or(i64::MAX)
    }

    /// Get the inner Decimal value
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Negated amount (used to turn a debit into a delta)
    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    /// Checked addition - None on overflow of the stroop range
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        Self::new(self.0.checked_add(other.0)?).ok()
    }

    /// Checked subtraction - None on overflow of the stroop range
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        Self::new(self.0.checked_sub(other.0)?).ok()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| AmountError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AmountError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rescales_to_seven_places() {
        let amount = Amount::new(dec!(1000)).unwrap();
        assert_eq!(amount.to_string(), "1000.0000000");
        assert_eq!(amount.value().scale(), SCALE);
    }

    #[test]
    fn test_zero_constant_has_scale() {
        assert_eq!(Amount::ZERO.to_string(), "0.0000000");
        assert!(Amount::ZERO.is_zero());
    }

    #[test]
    fn test_too_precise_rejected() {
        let result = Amount::new(dec!(0.00000001));
        assert!(matches!(result, Err(AmountError::TooPrecise(_))));
    }

    #[test]
    fn test_trailing_zeros_accepted() {
        let amount = Amount::new(dec!(1.000000000)).unwrap();
        assert_eq!(amount, Amount::new(dec!(1)).unwrap());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = Amount::new(dec!(922337203685.4775808));
        assert!(matches!(result, Err(AmountError::OutOfRange(_))));
    }

    #[test]
    fn test_stroops() {
        let amount = Amount::from_stroops(100);
        assert_eq!(amount.to_string(), "0.0000100");
        assert_eq!(amount.to_stroops(), 100);
    }

    #[test]
    fn test_repeated_small_additions_do_not_drift() {
        let step = Amount::new(dec!(0.1)).unwrap();
        let mut total = Amount::ZERO;
        for _ in 0..1000 {
            total = total.checked_add(&step).unwrap();
        }
        assert_eq!(total, Amount::new(dec!(100)).unwrap());
    }

    #[test]
    fn test_negate_and_sign() {
        let amount = Amount::new(dec!(5)).unwrap();
        assert!(amount.is_positive());
        assert!(amount.negate().is_negative());
        assert_eq!(amount.checked_add(&amount.negate()).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_parse_and_serialize_as_string() {
        let amount: Amount = "100".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"100.0000000\"");
        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amount);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!("abc".parse::<Amount>(), Err(AmountError::Invalid(_))));
    }
}
