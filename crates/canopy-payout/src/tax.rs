//! Withdrawal tax brackets.
//!
//! The bracket containing the amount sets one rate for the whole amount. This
//! makes the effective rate jump at bracket edges (100,000 pays 10,000 while
//! 100,001 pays 15,000.15); that discontinuity is the intended policy.

use crate::Money;

/// Upper bound (inclusive) and rate of one bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaxBracket {
    /// None for the open-ended top bracket
    pub up_to: Option<Money>,
    pub rate_bps: u32,
}

/// Brackets in ascending order of `up_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaxSchedule {
    pub brackets: Vec<TaxBracket>,
}

impl Default for TaxSchedule {
    fn default() -> Self {
        Self {
            brackets: vec![
                TaxBracket { up_to: Some(Money::from_major(10_000)), rate_bps: 0 },
                TaxBracket { up_to: Some(Money::from_major(50_000)), rate_bps: 500 },
                TaxBracket { up_to: Some(Money::from_major(100_000)), rate_bps: 1_000 },
                TaxBracket { up_to: None, rate_bps: 1_500 },
            ],
        }
    }
}

/// Tax computed for one withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxAssessment {
    pub amount: Money,
    pub rate_bps: u32,
    pub tax: Money,
    /// `amount - tax`
    pub credited: Money,
}

impl TaxSchedule {
    /// Rate of the bracket containing `amount`.
    ///
    /// Amounts above every bounded bracket with no open-ended bracket fall in
    /// the last one.
    pub fn rate_for(&self, amount: Money) -> u32 {
        self.brackets
            .iter()
            .find(|b| b.up_to.map_or(true, |cap| amount <= cap))
            .or_else(|| self.brackets.last())
            .map_or(0, |b| b.rate_bps)
    }

    pub fn assess(&self, amount: Money) -> TaxAssessment {
        let rate_bps = self.rate_for(amount);
        let tax = amount.apply_bps(rate_bps);
        TaxAssessment {
            amount,
            rate_bps,
            tax,
            credited: amount.saturating_sub(tax),
        }
    }
}

/// Tax on `amount` under the default brackets.
pub fn withdrawal_tax(amount: Money) -> Money {
    TaxSchedule::default().assess(amount).tax
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bracket_edges() {
        let schedule = TaxSchedule::default();
        let cases = [
            (Money::from_major(1), 0),
            (Money::from_major(10_000), 0),
            (Money::from_minor(1_000_001), 500), // 10,000.01
            (Money::from_major(50_000), 500),
            (Money::from_major(50_001), 1_000),
            (Money::from_major(100_000), 1_000),
            (Money::from_major(100_001), 1_500),
            (Money::from_major(10_000_000), 1_500),
        ];
        for (amount, rate) in cases {
            assert_eq!(schedule.rate_for(amount), rate, "rate for {amount}");
        }
    }

    #[test]
    fn flat_not_marginal() {
        let schedule = TaxSchedule::default();
        let at_edge = schedule.assess(Money::from_major(100_000));
        let past_edge = schedule.assess(Money::from_major(100_001));
        assert_eq!(at_edge.tax, Money::from_major(10_000));
        assert_eq!(past_edge.tax, Money::from_minor(1_500_015));
        assert_eq!(past_edge.credited, Money::from_minor(8_500_085));
    }

    #[test]
    fn schedule_without_open_bracket_uses_last() {
        let schedule = TaxSchedule {
            brackets: vec![TaxBracket { up_to: Some(Money::from_major(10)), rate_bps: 200 }],
        };
        assert_eq!(schedule.rate_for(Money::from_major(1_000)), 200);
        assert_eq!(TaxSchedule { brackets: vec![] }.rate_for(Money::from_major(5)), 0);
    }

    proptest! {
        #[test]
        fn tax_plus_credited_is_amount(minor in 0u64..100_000_000_000) {
            let a = TaxSchedule::default().assess(Money::from_minor(minor));
            prop_assert_eq!(a.tax + a.credited, a.amount);
            prop_assert!(a.tax <= a.amount);
        }
    }
}
