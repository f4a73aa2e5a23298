use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried at the boundary.
pub const SCALE: u32 = 2;

const MINOR_PER_MAJOR: i64 = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount {0} has more than two fractional digits")]
    TooPrecise(Decimal),
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    #[error("`{0}` is not a decimal amount")]
    Unparseable(String),
}

/// A signed amount held as integer minor units (cents, paise).
///
/// Arithmetic never rounds. Conversion to and from decimal happens only at
/// the edges: serde, `FromStr` and `Display`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Smallest representable amount, 0.01.
    pub const MINOR_UNIT: Money = Money(1);

    pub const fn from_minor(units: i64) -> Self {
        Money(units)
    }

    pub fn from_major(units: i64) -> Self {
        Money(units * MINOR_PER_MAJOR)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyError> {
        let scaled = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::OutOfRange(value))?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::TooPrecise(value));
        }
        scaled.to_i64().map(Money).ok_or(MoneyError::OutOfRange(value))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, SCALE)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Unparseable(s.to_string()))?;
        Money::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.to_decimal()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// Amounts travel as decimal strings so no float ever touches them.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_two_digit_amounts() {
        let m: Money = "33.34".parse().unwrap();
        assert_eq!(m.minor_units(), 3334);
        assert_eq!(m.to_string(), "33.34");
        assert_eq!(Money::from_minor(-3333).to_string(), "-33.33");
        assert_eq!(Money::from_major(5).to_string(), "5.00");
    }

    #[test]
    fn rejects_sub_cent_precision() {
        assert!(matches!("1.005".parse::<Money>(), Err(MoneyError::TooPrecise(_))));
        assert!(matches!("abc".parse::<Money>(), Err(MoneyError::Unparseable(_))));
        // trailing zeros beyond two digits are fine
        assert_eq!("1.500".parse::<Money>().unwrap(), Money::from_minor(150));
    }

    #[test]
    fn serde_uses_decimal_strings() {
        let json = serde_json::to_string(&Money::from_minor(4500)).unwrap();
        assert_eq!(json, "\"45.00\"");
        let back: Money = serde_json::from_str("\"27.10\"").unwrap();
        assert_eq!(back, Money::from_minor(2710));
    }

    #[test]
    fn deserializes_inside_request_bodies() {
        #[derive(Deserialize)]
        struct Intake {
            amount: Money,
        }
        let intake: Intake = serde_json::from_str(r#"{ "amount": "100.00" }"#).unwrap();
        assert_eq!(intake.amount, Money::from_major(100));
        let intake: Intake = serde_json::from_str(r#"{ "amount": "-12.5" }"#).unwrap();
        assert_eq!(intake.amount, Money::from_minor(-1250));
        assert!(serde_json::from_str::<Intake>(r#"{ "amount": "0.001" }"#).is_err());
    }
}
