//! Price - exact rational n/d, never floating point

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("Price numerator and denominator must be positive: {n}/{d}")]
    NonPositive { n: i32, d: i32 },
}

/// Price of one unit of the selling asset in terms of the buying asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    pub fn new(n: i32, d: i32) -> Result<Self, PriceError> {
        let price = Self { n, d };
        price.validate()?;
        Ok(price)
    }

    pub fn validate(&self) -> Result<(), PriceError> {
        if self.n <= 0 || self.d <= 0 {
            return Err(PriceError::NonPositive { n: self.n, d: self.d });
        }
        Ok(())
    }

    /// Decimal rendering for display, rounded to 7 places
    pub fn to_decimal(&self) -> Decimal {
        if self.d == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.n) / Decimal::from(self.d)).round_dp(7)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_non_positive() {
        assert!(Price::new(0, 1).is_err());
        assert!(Price::new(1, -2).is_err());
        assert!(Price::new(3, 2).is_ok());
    }

    #[test]
    fn test_decimal_rendering() {
        assert_eq!(Price::new(1, 3).unwrap().to_decimal(), dec!(0.3333333));
        assert_eq!(Price::new(5, 2).unwrap().to_decimal(), dec!(2.5));
    }
}
