//! Fixed-point currency amounts.
//!
//! Stored as an unsigned count of minor units (1/100 of a currency unit) so
//! balances can never go negative and tax arithmetic is exact.

use crate::error::{PayoutError, Result};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Minor units in one major unit.
pub const MINOR_PER_MAJOR: u64 = 100;

/// Basis points in 100%.
pub const BPS_SCALE: u64 = 10_000;

/// A non-negative amount of money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Money(u64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// From whole currency units.
    pub const fn from_major(major: u64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    /// From minor units.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Raw minor units.
    pub const fn minor(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// `self - other`, or None if that would go negative.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Apply a rate in basis points, rounding half up to the minor unit.
    pub fn apply_bps(self, bps: u32) -> Self {
        let scaled = self.0 as u128 * bps as u128 + (BPS_SCALE as u128 / 2);
        Self((scaled / BPS_SCALE as u128) as u64)
    }

    /// How many whole `width`s fit into this amount.
    pub fn count_of(self, width: Self) -> u64 {
        if width.0 == 0 {
            0
        } else {
            self.0 / width.0
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / MINOR_PER_MAJOR, self.0 % MINOR_PER_MAJOR)
    }
}

impl FromStr for Money {
    type Err = PayoutError;

    /// Accepts `"250"`, `"250.5"` and `"250.50"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PayoutError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (major, minor) = match trimmed.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (trimmed, ""),
        };
        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if minor.len() > 2 || !minor.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let major: u64 = major.parse().map_err(|_| invalid())?;
        let minor: u64 = match minor.len() {
            0 => 0,
            1 => minor.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => minor.parse().map_err(|_| invalid())?,
        };
        major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .map(Self)
            .ok_or(PayoutError::Overflow)
    }
}

impl TryFrom<String> for Money {
    type Error = PayoutError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}
