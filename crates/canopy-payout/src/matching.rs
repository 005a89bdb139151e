//! Binary matching with carry-forward.
//!
//! Each node carries the unmatched volume of both legs. When the weaker leg's
//! carry reaches the threshold, that volume is matched against the stronger
//! leg, paid at `rate_bps`, and removed from both. After a match the weaker
//! leg's carry is zero, so it never holds more unmatched volume than the
//! stronger one. Below the threshold both carries simply wait.

use crate::Money;

/// Deployment-specific matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchingConfig {
    /// Minimum matched volume that triggers a payout
    pub threshold: Money,
    /// Payout on matched volume, in basis points
    pub rate_bps: u32,
}

impl Default for MatchingConfig {
    /// Matches from 1,000 upwards and pays nothing until a rate is configured.
    fn default() -> Self {
        Self {
            threshold: Money::from_major(1_000),
            rate_bps: 0,
        }
    }
}

/// Unmatched volume per leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarryForward {
    pub a: Money,
    pub b: Money,
}

impl CarryForward {
    pub fn new(a: Money, b: Money) -> Self {
        Self { a, b }
    }

    /// Volume that could be matched right now.
    pub fn matchable(&self) -> Money {
        self.a.min(self.b)
    }
}

/// A match that paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Volume removed from each leg
    pub matched: Money,
    /// Amount to credit to income
    pub payout: Money,
}

impl MatchingConfig {
    /// Run one matching evaluation, updating `carry` in place.
    pub fn evaluate(&self, carry: &mut CarryForward) -> Option<MatchOutcome> {
        let matched = carry.matchable();
        if matched.is_zero() || matched < self.threshold {
            return None;
        }
        carry.a = carry.a.saturating_sub(matched);
        carry.b = carry.b.saturating_sub(matched);
        Some(MatchOutcome {
            matched,
            payout: matched.apply_bps(self.rate_bps),
        })
    }
}

/// Share of each purchase credited to the purchaser's sponsor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SponsorBonus {
    pub rate_bps: u32,
}

impl SponsorBonus {
    pub fn bonus_for(&self, purchase: Money) -> Money {
        purchase.apply_bps(self.rate_bps)
    }
}
