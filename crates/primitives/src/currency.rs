use std::{fmt, iter::Sum};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// An amount of the chain's base currency, in indivisible base units.
///
/// All consensus arithmetic on currency is checked; overflow is surfaced as
/// an error by callers instead of wrapping or panicking.
#[derive(
    Copy,
    Clone,
    Eq,
    Default,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Currency(u128);

impl Currency {
    pub const ZERO: Currency = Currency(0);

    pub const fn new(base_units: u128) -> Self {
        Self(base_units)
    }

    pub const fn to_base_units(self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Currency) -> Option<Currency> {
        self.0.checked_add(other.0).map(Currency)
    }

    pub fn checked_sub(self, other: Currency) -> Option<Currency> {
        self.0.checked_sub(other.0).map(Currency)
    }

    pub fn checked_mul_units(self, units: u64) -> Option<Currency> {
        self.0.checked_mul(units as u128).map(Currency)
    }

    pub fn checked_div_units(self, units: u64) -> Option<Currency> {
        self.0.checked_div(units as u128).map(Currency)
    }

    /// Sums an iterator of amounts, returning `None` on overflow.
    pub fn checked_sum(amounts: impl Iterator<Item = Currency>) -> Option<Currency> {
        let mut total = Currency::ZERO;
        for amount in amounts {
            total = total.checked_add(amount)?;
        }
        Some(total)
    }
}

impl From<u128> for Currency {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
        Currency(iter.map(|c| c.0).sum())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
