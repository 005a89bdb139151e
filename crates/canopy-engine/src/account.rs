//! Per-node financial state.
//!
//! Everything here is plain data plus the rules that mutate it. Locking,
//! persistence and logging are the caller's business (see [`crate::Network`]).

use crate::error::{Error, Result};
use canopy_payout::{CarryForward, MatchOutcome, MatchingConfig, Money, SlabSchedule, TaxSchedule};
use canopy_topology::{NodeId, Side};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    /// Only a processing withdrawal may settle, and only once.
    pub fn can_become(self, next: WithdrawalStatus) -> bool {
        self == WithdrawalStatus::Processing && next != WithdrawalStatus::Processing
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::Processing => write!(f, "processing"),
            WithdrawalStatus::Completed => write!(f, "completed"),
            WithdrawalStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A withdrawal request. Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub id: String,
    pub requested_at_ms: u64,
    pub amount: Money,
    pub tax_amount: Money,
    pub credited_amount: Money,
    pub status: WithdrawalStatus,
    pub expected_clear_at_ms: u64,
}

/// One award of reward credits on a leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    pub at_ms: u64,
    pub leg: Side,
    /// Cumulative leg turnover that triggered the award
    pub turnover_at_entry: Money,
    pub credits_earned: u64,
    /// `reward_credits` after this award
    pub running_total: u64,
}

/// Kind of wallet movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletEntryKind {
    TopUp,
    WithdrawalHold,
    WithdrawalRefund,
    MatchingPayout,
    SponsorBonus,
}

/// Append-only wallet log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub at_ms: u64,
    pub kind: WalletEntryKind,
    pub amount: Money,
    /// The affected balance after this entry
    pub balance_after: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Financial record of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub purchase_value: Money,
    pub leg_a_sales: Money,
    pub leg_b_sales: Money,
    pub carry_forward_a: Money,
    pub carry_forward_b: Money,
    pub income_balance: Money,
    pub spendable_balance: Money,
    pub reward_credits: u64,
    pub credits_leg_a: u64,
    pub credits_leg_b: u64,
    pub withdrawals: Vec<WithdrawalRecord>,
    pub credit_ledger: Vec<CreditLedgerEntry>,
    pub wallet_log: Vec<WalletEntry>,
}

impl Account {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative turnover of one leg.
    pub fn leg_sales(&self, side: Side) -> Money {
        match side {
            Side::Left => self.leg_a_sales,
            Side::Right => self.leg_b_sales,
        }
    }

    pub fn carry_forward(&self) -> CarryForward {
        CarryForward::new(self.carry_forward_a, self.carry_forward_b)
    }

    /// Credits already awarded for one leg.
    pub fn leg_credits(&self, side: Side) -> u64 {
        match side {
            Side::Left => self.credits_leg_a,
            Side::Right => self.credits_leg_b,
        }
    }

    /// Purchase volume arriving from `side`: counts toward turnover and waits
    /// for matching.
    pub fn add_leg_volume(&mut self, side: Side, value: Money) {
        match side {
            Side::Left => {
                self.leg_a_sales += value;
                self.carry_forward_a += value;
            }
            Side::Right => {
                self.leg_b_sales += value;
                self.carry_forward_b += value;
            }
        }
    }

    /// Move existing turnover into or out of a leg without touching the
    /// matching carry. Used when a subtree changes position.
    pub fn shift_leg_turnover(&mut self, side: Side, value: Money, inbound: bool) {
        let sales = match side {
            Side::Left => &mut self.leg_a_sales,
            Side::Right => &mut self.leg_b_sales,
        };
        *sales = if inbound {
            *sales + value
        } else {
            sales.saturating_sub(value)
        };
    }

    /// Award any credits newly earned on `side`. Credits never decrease.
    pub fn award_credits(
        &mut self,
        side: Side,
        schedule: &SlabSchedule,
        at_ms: u64,
    ) -> Option<CreditLedgerEntry> {
        let turnover = self.leg_sales(side);
        let earned = schedule.credits_for(turnover);
        let awarded = match side {
            Side::Left => &mut self.credits_leg_a,
            Side::Right => &mut self.credits_leg_b,
        };
        if earned <= *awarded {
            return None;
        }
        let delta = earned - *awarded;
        *awarded = earned;
        self.reward_credits += delta;

        let entry = CreditLedgerEntry {
            at_ms,
            leg: side,
            turnover_at_entry: turnover,
            credits_earned: delta,
            running_total: self.reward_credits,
        };
        self.credit_ledger.push(entry.clone());
        Some(entry)
    }

    /// Run one matching evaluation over the carry-forwards and pay the result
    /// into income.
    pub fn run_matching(&mut self, config: &MatchingConfig, at_ms: u64) -> Option<MatchOutcome> {
        let mut carry = self.carry_forward();
        let outcome = config.evaluate(&mut carry)?;
        self.carry_forward_a = carry.a;
        self.carry_forward_b = carry.b;
        if !outcome.payout.is_zero() {
            self.credit_income(WalletEntryKind::MatchingPayout, outcome.payout, at_ms, None);
        }
        Some(outcome)
    }

    /// Add to income and log it.
    pub fn credit_income(
        &mut self,
        kind: WalletEntryKind,
        amount: Money,
        at_ms: u64,
        reference: Option<String>,
    ) {
        self.income_balance += amount;
        self.log(kind, amount, self.income_balance, at_ms, reference);
    }

    /// Add to the spendable balance if `amount` is within `min..=max`.
    pub fn top_up(&mut self, amount: Money, min: Money, max: Money, at_ms: u64) -> Result<Money> {
        if amount < min || amount > max {
            return Err(Error::OutOfRange(format!(
                "top-up {} outside {}..={}",
                amount, min, max
            )));
        }
        self.spendable_balance += amount;
        self.log(WalletEntryKind::TopUp, amount, self.spendable_balance, at_ms, None);
        Ok(self.spendable_balance)
    }

    /// Hold `amount` from income and open a processing withdrawal.
    pub fn request_withdrawal(
        &mut self,
        owner: &NodeId,
        amount: Money,
        tax: &TaxSchedule,
        now_ms: u64,
        clearance_ms: u64,
    ) -> Result<WithdrawalRecord> {
        if amount.is_zero() {
            return Err(Error::OutOfRange("withdrawal amount must be positive".into()));
        }
        let remaining = self
            .income_balance
            .checked_sub(amount)
            .ok_or(Error::InsufficientBalance {
                requested: amount,
                available: self.income_balance,
            })?;

        let assessment = tax.assess(amount);
        let record = WithdrawalRecord {
            id: format!("WD{}-{:04}", owner, self.withdrawals.len() + 1),
            requested_at_ms: now_ms,
            amount,
            tax_amount: assessment.tax,
            credited_amount: assessment.credited,
            status: WithdrawalStatus::Processing,
            expected_clear_at_ms: now_ms.saturating_add(clearance_ms),
        };

        self.income_balance = remaining;
        self.log(
            WalletEntryKind::WithdrawalHold,
            amount,
            remaining,
            now_ms,
            Some(record.id.clone()),
        );
        self.withdrawals.push(record.clone());
        Ok(record)
    }

    /// Move a processing withdrawal to `to`. Failure refunds the held amount.
    pub fn settle_withdrawal(
        &mut self,
        id: &str,
        to: WithdrawalStatus,
        now_ms: u64,
    ) -> Result<WithdrawalRecord> {
        let record = self
            .withdrawals
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("withdrawal {}", id)))?;
        if !record.status.can_become(to) {
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to,
            });
        }
        record.status = to;
        let settled = record.clone();

        if to == WithdrawalStatus::Failed {
            self.income_balance += settled.amount;
            self.log(
                WalletEntryKind::WithdrawalRefund,
                settled.amount,
                self.income_balance,
                now_ms,
                Some(settled.id.clone()),
            );
        }
        Ok(settled)
    }

    /// Withdrawals still waiting for an administrative outcome.
    pub fn pending_withdrawals(&self) -> impl Iterator<Item = &WithdrawalRecord> {
        self.withdrawals
            .iter()
            .filter(|w| w.status == WithdrawalStatus::Processing)
    }

    fn log(
        &mut self,
        kind: WalletEntryKind,
        amount: Money,
        balance_after: Money,
        at_ms: u64,
        reference: Option<String>,
    ) {
        self.wallet_log.push(WalletEntry {
            at_ms,
            kind,
            amount,
            balance_after,
            reference,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_topology::Role;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn owner() -> NodeId {
        NodeId::new(Role::Customer, 7)
    }

    fn funded(major: u64) -> Account {
        let mut account = Account::new();
        account.income_balance = Money::from_major(major);
        account
    }

    #[test]
    fn leg_volume_feeds_sales_and_carry() {
        let mut account = Account::new();
        account.add_leg_volume(Side::Left, Money::from_major(300));
        account.add_leg_volume(Side::Right, Money::from_major(100));
        assert_eq!(account.leg_a_sales, Money::from_major(300));
        assert_eq!(account.carry_forward(), CarryForward::new(Money::from_major(300), Money::from_major(100)));
    }

    #[test]
    fn shifting_turnover_leaves_carry_alone() {
        let mut account = Account::new();
        account.add_leg_volume(Side::Left, Money::from_major(500));
        account.shift_leg_turnover(Side::Left, Money::from_major(200), false);
        assert_eq!(account.leg_a_sales, Money::from_major(300));
        assert_eq!(account.carry_forward_a, Money::from_major(500));
        account.shift_leg_turnover(Side::Left, Money::from_major(900), false);
        assert_eq!(account.leg_a_sales, Money::ZERO);
    }

    #[test]
    fn credits_award_deltas_per_leg() {
        let schedule = SlabSchedule::default();
        let mut account = Account::new();

        account.add_leg_volume(Side::Left, Money::from_major(199_999));
        assert!(account.award_credits(Side::Left, &schedule, 1).is_none());

        account.add_leg_volume(Side::Left, Money::from_major(1));
        let entry = account.award_credits(Side::Left, &schedule, 2).unwrap();
        assert_eq!(entry.credits_earned, 10);
        assert_eq!(entry.running_total, 10);

        account.add_leg_volume(Side::Right, Money::from_major(700_000));
        let entry = account.award_credits(Side::Right, &schedule, 3).unwrap();
        assert_eq!(entry.credits_earned, 25);
        assert_eq!(entry.running_total, 35);

        // Re-evaluating without new volume awards nothing
        assert!(account.award_credits(Side::Right, &schedule, 4).is_none());
        assert_eq!(account.reward_credits, account.credits_leg_a + account.credits_leg_b);
        assert_eq!(account.credit_ledger.len(), 2);
    }

    #[test]
    fn matching_pays_into_income() {
        let config = MatchingConfig {
            threshold: Money::from_major(1_000),
            rate_bps: 1_000,
        };
        let mut account = Account::new();
        account.add_leg_volume(Side::Left, Money::from_major(1_500));
        assert!(account.run_matching(&config, 1).is_none());

        account.add_leg_volume(Side::Right, Money::from_major(1_200));
        let outcome = account.run_matching(&config, 2).unwrap();
        assert_eq!(outcome.matched, Money::from_major(1_200));
        assert_eq!(account.income_balance, Money::from_major(120));
        assert_eq!(account.carry_forward_a, Money::from_major(300));
        assert_eq!(account.carry_forward_b, Money::ZERO);
        // Cumulative sales are untouched by matching
        assert_eq!(account.leg_a_sales, Money::from_major(1_500));
        assert_eq!(account.wallet_log.last().unwrap().kind, WalletEntryKind::MatchingPayout);
    }

    #[test]
    fn top_up_bounds_are_inclusive() {
        let (min, max) = (Money::from_major(10), Money::from_major(50_000));
        let mut account = Account::new();
        assert!(account.top_up(min, min, max, 0).is_ok());
        assert!(account.top_up(max, min, max, 0).is_ok());
        assert!(matches!(
            account.top_up(Money::from_minor(999), min, max, 0),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            account.top_up(Money::from_minor(5_000_001), min, max, 0),
            Err(Error::OutOfRange(_))
        ));
        assert_eq!(account.spendable_balance, Money::from_major(50_010));
        assert_eq!(account.wallet_log.len(), 2);
    }

    #[test]
    fn withdrawal_holds_income_and_taxes_flat() {
        let mut account = funded(200_000);
        let record = account
            .request_withdrawal(&owner(), Money::from_major(50_000), &TaxSchedule::default(), 1_000, 3 * DAY_MS)
            .unwrap();
        assert_eq!(record.id, "WDCUS000007-0001");
        assert_eq!(record.tax_amount, Money::from_major(2_500));
        assert_eq!(record.credited_amount, Money::from_major(47_500));
        assert_eq!(record.status, WithdrawalStatus::Processing);
        assert_eq!(record.expected_clear_at_ms - record.requested_at_ms, 3 * DAY_MS);
        assert_eq!(account.income_balance, Money::from_major(150_000));
    }

    #[test]
    fn withdrawal_rejects_zero_and_overdraft() {
        let mut account = funded(100);
        let tax = TaxSchedule::default();
        assert!(matches!(
            account.request_withdrawal(&owner(), Money::ZERO, &tax, 0, 0),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            account.request_withdrawal(&owner(), Money::from_major(101), &tax, 0, 0),
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(account.income_balance, Money::from_major(100));
        assert!(account.withdrawals.is_empty());
    }

    #[test]
    fn failed_withdrawal_refunds_once() {
        let mut account = funded(1_000);
        let tax = TaxSchedule::default();
        let record = account
            .request_withdrawal(&owner(), Money::from_major(400), &tax, 0, 0)
            .unwrap();
        assert_eq!(account.income_balance, Money::from_major(600));

        let failed = account.settle_withdrawal(&record.id, WithdrawalStatus::Failed, 5).unwrap();
        assert_eq!(failed.status, WithdrawalStatus::Failed);
        assert_eq!(account.income_balance, Money::from_major(1_000));

        let err = account
            .settle_withdrawal(&record.id, WithdrawalStatus::Failed, 6)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(account.income_balance, Money::from_major(1_000));
    }

    #[test]
    fn completed_withdrawal_is_final() {
        let mut account = funded(1_000);
        let record = account
            .request_withdrawal(&owner(), Money::from_major(100), &TaxSchedule::default(), 0, 0)
            .unwrap();
        account.settle_withdrawal(&record.id, WithdrawalStatus::Completed, 1).unwrap();
        assert!(account.pending_withdrawals().next().is_none());
        assert!(matches!(
            account.settle_withdrawal(&record.id, WithdrawalStatus::Failed, 2),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(
            account.settle_withdrawal("WD-missing", WithdrawalStatus::Completed, 2),
            Err(Error::NotFound(_))
        ));
        assert_eq!(account.income_balance, Money::from_major(900));
    }

    #[test]
    fn account_json_tolerates_missing_fields() {
        let account: Account = serde_json::from_str(r#"{"income_balance":"12.50"}"#).unwrap();
        assert_eq!(account.income_balance, Money::from_minor(1_250));
        assert!(account.withdrawals.is_empty());
    }
}
