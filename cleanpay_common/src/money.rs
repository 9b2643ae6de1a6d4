use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

/// A money amount in integer cents.
///
/// All amounts in the system are stored and passed around as cents to avoid
/// floating point bookkeeping errors. Display formats as a decimal value with
/// two places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The given percentage of this amount, rounded down to the nearest cent.
    pub fn percent(&self, pct: i64) -> Cents {
        Cents(self.0 * pct / 100)
    }
}

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Self) -> Self::Output {
        Cents(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, rhs: Self) -> Self::Output {
        Cents(self.0 - rhs.0)
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Cents {
    type Output = Cents;

    fn neg(self) -> Self::Output {
        Cents(-self.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Cents(iter.map(|c| c.0).sum())
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / 100;
        let frac = (self.0 % 100).abs();
        write!(f, "{whole}.{frac:02}")
    }
}

#[cfg(test)]
mod test {
    use super::Cents;

    #[test]
    fn display_formats_two_decimal_places() {
        assert_eq!(Cents::from(123_45).to_string(), "123.45");
        assert_eq!(Cents::from(5).to_string(), "0.05");
        assert_eq!(Cents::from(-150).to_string(), "-1.50");
    }

    #[test]
    fn percentage_rounds_down() {
        assert_eq!(Cents::from(10_000).percent(15), Cents::from(1_500));
        assert_eq!(Cents::from(999).percent(15), Cents::from(149));
    }

    #[test]
    fn arithmetic() {
        let a = Cents::from(1_000);
        let b = Cents::from(250);
        assert_eq!(a + b, Cents::from(1_250));
        assert_eq!(a - b, Cents::from(750));
        assert_eq!(-b, Cents::from(-250));
    }
}
