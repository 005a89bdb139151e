//! Reward credit slabs.
//!
//! Turnover is consumed slab by slab. A slab contributes its credits only once
//! its full width is covered; the first slab that cannot be completed stops
//! accumulation. After the fixed tiers, a repeating slab pays once per full
//! width.
//!
//! The result depends only on the turnover value, so it is monotonic and can
//! be recomputed at any time without regard to call order.

use crate::Money;

/// One step of the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slab {
    /// Turnover this slab consumes
    pub width: Money,
    /// Credits granted once the width is fully covered
    pub credits: u64,
}

impl Slab {
    pub const fn new(width: Money, credits: u64) -> Self {
        Self { width, credits }
    }
}

const DEFAULT_TIERS: [Slab; 3] = [
    Slab::new(Money::from_major(200_000), 10),
    Slab::new(Money::from_major(500_000), 15),
    Slab::new(Money::from_major(1_000_000), 20),
];

const DEFAULT_REPEATING: Slab = Slab::new(Money::from_major(2_000_000), 25);

/// Ordered slab table plus an optional repeating tail.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlabSchedule {
    pub tiers: Vec<Slab>,
    pub repeating: Option<Slab>,
}

impl Default for SlabSchedule {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.to_vec(),
            repeating: Some(DEFAULT_REPEATING),
        }
    }
}

impl SlabSchedule {
    /// Credits earned by `turnover`.
    pub fn credits_for(&self, turnover: Money) -> u64 {
        let mut remaining = turnover;
        let mut credits = 0u64;
        for slab in &self.tiers {
            match remaining.checked_sub(slab.width) {
                Some(rest) => {
                    remaining = rest;
                    credits += slab.credits;
                }
                None => return credits,
            }
        }
        match self.repeating {
            Some(tail) => credits + remaining.count_of(tail.width) * tail.credits,
            None => credits,
        }
    }

    /// Total turnover at which the next credit is earned, if any.
    pub fn next_threshold(&self, turnover: Money) -> Option<Money> {
        let mut reached = Money::ZERO;
        for slab in &self.tiers {
            reached = reached.checked_add(slab.width)?;
            if turnover < reached {
                return Some(reached);
            }
        }
        let tail = self.repeating?;
        if tail.width.is_zero() {
            return None;
        }
        let extra = turnover.saturating_sub(reached).count_of(tail.width) + 1;
        let step = tail.width.minor().checked_mul(extra)?;
        reached.checked_add(Money::from_minor(step))
    }
}

/// Credits for `turnover` under the default schedule.
pub fn reward_credits(turnover: Money) -> u64 {
    SlabSchedule::default().credits_for(turnover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn no_partial_credit() {
        let schedule = SlabSchedule::default();
        assert_eq!(schedule.credits_for(Money::ZERO), 0);
        assert_eq!(schedule.credits_for(Money::from_minor(19_999_999)), 0);
        assert_eq!(schedule.credits_for(Money::from_major(699_999)), 10);
        assert_eq!(schedule.credits_for(Money::from_major(1_699_999)), 25);
        assert_eq!(schedule.credits_for(Money::from_major(3_699_999)), 45);
    }

    #[test]
    fn repeating_tail() {
        let schedule = SlabSchedule::default();
        assert_eq!(schedule.credits_for(Money::from_major(5_700_000)), 95);
        assert_eq!(schedule.credits_for(Money::from_major(7_699_999)), 95);
        assert_eq!(schedule.credits_for(Money::from_major(7_700_000)), 120);
    }

    #[test]
    fn schedule_without_tail_caps() {
        let schedule = SlabSchedule {
            tiers: DEFAULT_TIERS.to_vec(),
            repeating: None,
        };
        assert_eq!(schedule.credits_for(Money::from_major(50_000_000)), 45);
        assert_eq!(schedule.next_threshold(Money::from_major(2_000_000)), None);
    }

    #[test]
    fn next_threshold_walks_the_table() {
        let schedule = SlabSchedule::default();
        assert_eq!(
            schedule.next_threshold(Money::ZERO),
            Some(Money::from_major(200_000))
        );
        assert_eq!(
            schedule.next_threshold(Money::from_major(200_000)),
            Some(Money::from_major(700_000))
        );
        assert_eq!(
            schedule.next_threshold(Money::from_major(1_700_000)),
            Some(Money::from_major(3_700_000))
        );
        assert_eq!(
            schedule.next_threshold(Money::from_major(4_000_000)),
            Some(Money::from_major(5_700_000))
        );
    }

    proptest! {
        #[test]
        fn credits_are_monotonic(a in 0u64..2_000_000_000, b in 0u64..2_000_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(reward_credits(Money::from_minor(lo)) <= reward_credits(Money::from_minor(hi)));
        }

        #[test]
        fn next_threshold_earns_more(t in 0u64..1_000_000_000) {
            let schedule = SlabSchedule::default();
            let turnover = Money::from_minor(t);
            let next = schedule.next_threshold(turnover).unwrap();
            prop_assert!(next > turnover);
            prop_assert!(schedule.credits_for(next) > schedule.credits_for(turnover));
        }
    }
}
