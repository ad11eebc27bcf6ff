use crate::model::constants::LOT_SIZE;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, iter::Sum, str::FromStr};
use thiserror::Error;

/// Number of digits written for currency amounts in output tables.
pub(crate) const AMOUNT_DIGITS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConvertAmountError {
    /// Unable to parse decimal string.
    #[error("Unable to parse decimal string")]
    Decimal(#[from] rust_decimal::Error),
}

/// A signed position size, counted in lots of [`LOT_SIZE`] shares.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Lots(Decimal);

/// Per-share price.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

/// Currency amount, e.g. a gain, a loss or a dividend payout.
#[derive(Copy, Clone, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

macro_rules! impl_math_ops {
    ($name:ident) => {
        impl ::std::ops::Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ::std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl ::std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl ::std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl ::std::ops::SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::default(), |acc, item| acc + item)
            }
        }

        impl FromStr for $name {
            type Err = ConvertAmountError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl $name {
            pub const ZERO: Self = Self(Decimal::ZERO);

            pub fn to_decimal(self) -> Decimal {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(self) -> bool {
                self.0 > Decimal::ZERO
            }

            pub fn is_negative(self) -> bool {
                self.0 < Decimal::ZERO
            }
        }
    };
}

impl_math_ops!(Lots);
impl_math_ops!(Price);
impl_math_ops!(Amount);

impl Price {
    /// Currency value of `lots` at this per-share price.
    pub fn value_of(self, lots: Lots) -> Amount {
        Amount(self.0 * lots.0 * LOT_SIZE)
    }
}

impl Amount {
    /// Drop the fractional part, rounding toward zero.
    pub fn trunc(self) -> Self {
        let amount = self.0.trunc();

        // Avoid printing "-0"
        if amount.is_zero() {
            Self(Decimal::ZERO)
        } else {
            Self(amount)
        }
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Banker's rounding, the `Decimal` default.
        let amount = self.0.round_dp(AMOUNT_DIGITS);
        let amount = if amount.is_zero() {
            Decimal::ZERO
        } else {
            amount
        };

        write!(f, "{amount:.precision$}", precision = AMOUNT_DIGITS as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbtest::arbtest;

    #[test]
    fn test_value_of_lots() {
        let price: Price = "150".parse().unwrap();
        let lots: Lots = "5".parse().unwrap();
        assert_eq!(price.value_of(lots), "750000".parse::<Amount>().unwrap());

        let price: Price = "-12.5".parse().unwrap();
        let lots: Lots = "0.5".parse().unwrap();
        assert_eq!(price.value_of(lots), "-6250".parse::<Amount>().unwrap());
    }

    #[test]
    fn test_amount_display() {
        let amount: Amount = "1234.565".parse().unwrap();
        assert_eq!(amount.to_string(), "1234.56");

        let amount: Amount = "1234.575".parse().unwrap();
        assert_eq!(amount.to_string(), "1234.58");

        let amount: Amount = "-0.001".parse().unwrap();
        assert_eq!(amount.to_string(), "0.00");

        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_amount_trunc() {
        let amount: Amount = "1999.99".parse().unwrap();
        assert_eq!(amount.trunc().to_string(), "1999.00");

        let amount: Amount = "-1999.99".parse().unwrap();
        assert_eq!(amount.trunc().to_decimal(), Decimal::from(-1999));

        let amount: Amount = "-0.4".parse().unwrap();
        assert_eq!(amount.trunc().to_decimal().to_string(), "0");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let lots: Lots = " 10 ".parse().unwrap();
        assert_eq!(lots.to_decimal(), Decimal::from(10));
        assert!("ten".parse::<Lots>().is_err());
    }

    #[test]
    fn prop_test_sum_matches_fold() {
        arbtest(|u| {
            let values: Vec<i32> = u.arbitrary()?;
            let amounts = values.iter().map(|v| Amount::from(Decimal::from(*v)));
            let expected: i64 = values.iter().map(|v| i64::from(*v)).sum();

            assert_eq!(amounts.sum::<Amount>().to_decimal(), Decimal::from(expected));
            Ok(())
        });
    }
}
