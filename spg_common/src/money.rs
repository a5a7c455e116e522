use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const NAIRA_CURRENCY_CODE: &str = "NGN";
pub const NAIRA_CURRENCY_CODE_LOWER: &str = "ngn";

/// Number of minor units (kobo) in one major unit (naira).
pub const KOBO_PER_NAIRA: i64 = 100;

//--------------------------------------       Money        ---------------------------------------------------------
/// An amount of money in kobo, the minor currency unit.
///
/// Every amount in the system is a `Money` value. The kobo representation is what crosses the payment gateway
/// boundary; major-unit (naira) values only exist at the edges, where [`Money::from_major_str`] and
/// [`Money::to_major_string`] convert exactly for values with two or fewer decimal places.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in kobo: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {} is too large to convert to Money", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₦{}", self.to_major_string())
    }
}

impl Money {
    /// The amount in kobo.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_naira(naira: i64) -> Self {
        Self(naira * KOBO_PER_NAIRA)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parses a major-unit decimal string ("1250", "1250.5", "1250.50") into kobo, exactly.
    ///
    /// Values with more than two decimal places are rejected rather than rounded, since they cannot be represented
    /// in kobo without drift.
    pub fn from_major_str(s: &str) -> Result<Self, MoneyConversionError> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' has sub-kobo precision")));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        let whole = if whole.is_empty() { 0 } else {
            whole.parse::<i64>().map_err(|e| MoneyConversionError(format!("'{s}': {e}")))?
        };
        let mut kobo = frac.parse::<i64>().unwrap_or_default();
        if frac.len() == 1 {
            kobo *= 10;
        }
        whole
            .checked_mul(KOBO_PER_NAIRA)
            .and_then(|naira| naira.checked_add(kobo))
            .map(|v| Self(sign * v))
            .ok_or_else(|| MoneyConversionError(format!("'{s}' overflows the kobo representation")))
    }

    /// Converts a major-unit float into kobo, rounding to the nearest kobo.
    pub fn from_major_f64(value: f64) -> Result<Self, MoneyConversionError> {
        let kobo = (value * KOBO_PER_NAIRA as f64).round();
        if !kobo.is_finite() || kobo.abs() >= i64::MAX as f64 {
            return Err(MoneyConversionError(format!("{value} cannot be converted to kobo")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(kobo as i64))
    }

    /// The major-unit value with exactly two decimal places, e.g. `12500` kobo renders as "125.00".
    pub fn to_major_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        format!("{sign}{}.{:02}", abs / KOBO_PER_NAIRA, abs % KOBO_PER_NAIRA)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn major_strings_convert_exactly() {
        assert_eq!(Money::from_major_str("5000").unwrap(), Money::from(500_000));
        assert_eq!(Money::from_major_str("123.45").unwrap(), Money::from(12_345));
        assert_eq!(Money::from_major_str("123.4").unwrap(), Money::from(12_340));
        assert_eq!(Money::from_major_str("0.05").unwrap(), Money::from(5));
        assert_eq!(Money::from_major_str("-10.00").unwrap(), Money::from(-1000));
    }

    #[test]
    fn sub_kobo_precision_is_rejected() {
        assert!(Money::from_major_str("12.345").is_err());
        assert!(Money::from_major_str("twelve").is_err());
        assert!(Money::from_major_str(".").is_err());
    }

    #[test]
    fn round_trip_two_decimal_places() {
        for s in ["0.01", "1.00", "99.99", "12500.00", "7449.05"] {
            let amount = Money::from_major_str(s).unwrap();
            assert_eq!(amount.to_major_string(), s);
        }
    }

    #[test]
    fn float_conversion_rounds_to_nearest_kobo() {
        assert_eq!(Money::from_major_f64(123.455).unwrap(), Money::from(12_346));
        assert_eq!(Money::from_major_f64(123.454).unwrap(), Money::from(12_345));
    }

    #[test]
    fn arithmetic() {
        let subtotal = Money::from_naira(100) + Money::from_naira(50);
        assert_eq!(subtotal, Money::from(15_000));
        assert_eq!(Money::from_naira(50) * 3, Money::from_naira(150));
        let total: Money = [Money::from(100), Money::from(250)].into_iter().sum();
        assert_eq!(total, Money::from(350));
    }

    #[test]
    fn display_renders_major_units() {
        assert_eq!(Money::from(12_345).to_string(), "₦123.45");
    }
}
