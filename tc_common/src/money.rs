use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "KES";
pub const CURRENCY_CODE_LOWER: &str = "kes";

const CENTS_PER_UNIT: i64 = 100;

//--------------------------------------        Money        ---------------------------------------------------------
/// An amount of Kenyan shillings, stored as an integer number of cents.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
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
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

/// Parses a decimal amount of whole units, e.g. `"1250"`, `"1250.5"` or `"1250.50"`. More than two decimal places is
/// an error.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (units, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if units.is_empty() || fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyConversionError(s.to_string()));
        }
        let units = units.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))? * 10,
            _ => fraction.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?,
        };
        let value = units
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| MoneyConversionError(format!("{s} overflows")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let cents_per_unit = CENTS_PER_UNIT as u64;
        write!(f, "{sign}{}.{:02}", abs / cents_per_unit, abs % cents_per_unit)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * CENTS_PER_UNIT)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Applies a rate expressed in basis points (1/100th of a percent), rounding half away from zero.
    pub fn apply_rate_bps(&self, bps: i64) -> Self {
        let product = i128::from(self.0) * i128::from(bps);
        let rounded = (product + product.signum() * 5_000) / 10_000;
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    /// Formats the amount with the currency code prefix, e.g. `KES 1250.00`.
    pub fn with_currency(&self) -> String {
        format!("{CURRENCY_CODE} {self}")
    }
}
