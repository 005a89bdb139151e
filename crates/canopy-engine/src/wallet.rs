//! Wallet ledger: top-ups, withdrawals and their administrative outcomes.

use crate::account::{Account, CreditLedgerEntry, WalletEntry, WithdrawalRecord, WithdrawalStatus};
use crate::error::{Error, Result};
use crate::network::{Network, SaveReport};
use crate::now_ms;
use canopy_payout::Money;
use canopy_topology::NodeId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A processing withdrawal and the node that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWithdrawal {
    pub node: NodeId,
    #[serde(flatten)]
    pub record: WithdrawalRecord,
}

impl Network {
    /// Run `op` on one account under its lock and persist the result.
    fn update_account<T, F>(&self, id: &NodeId, op: F) -> Result<T>
    where
        F: FnOnce(&mut Account, u64) -> Result<T>,
    {
        let registry = self.registry.read();
        let node = registry.tree.get(id).ok_or_else(|| Error::unknown(id))?;
        let account = self.account(id)?;
        let mut account = account.lock();

        let out = op(&mut account, now_ms())?;
        let mut report = SaveReport::default();
        self.save_locked(node, &account, &mut report);
        report.finish()?;
        Ok(out)
    }

    fn read_account<T, F>(&self, id: &NodeId, op: F) -> Result<T>
    where
        F: FnOnce(&Account) -> T,
    {
        let _registry = self.registry.read();
        let account = self.account(id)?;
        let account = account.lock();
        Ok(op(&account))
    }

    /// Add to a node's spendable balance. Returns the new balance.
    pub fn top_up_spendable(&self, id: &NodeId, amount: Money) -> Result<Money> {
        let (min, max) = (self.config.top_up_min, self.config.top_up_max);
        let result = self.update_account(id, |account, now| account.top_up(amount, min, max, now));
        match &result {
            Ok(balance) => info!("Top-up of {} for {}, spendable now {}", amount, id, balance),
            Err(Error::Durability { .. }) => {}
            Err(e) => warn!("Top-up for {} rejected: {}", id, e),
        }
        result
    }

    /// Hold `amount` of income and open a withdrawal.
    pub fn request_withdrawal(&self, id: &NodeId, amount: Money) -> Result<WithdrawalRecord> {
        let tax = &self.config.tax;
        let clearance = self.config.clearance_ms();
        let result = self.update_account(id, |account, now| {
            account.request_withdrawal(id, amount, tax, now, clearance)
        });
        match &result {
            Ok(record) => info!(
                "Withdrawal {} requested: {} (tax {}, credited {})",
                record.id, record.amount, record.tax_amount, record.credited_amount
            ),
            Err(Error::Durability { .. }) => {}
            Err(e) => warn!("Withdrawal for {} rejected: {}", id, e),
        }
        result
    }

    /// Mark a processing withdrawal as paid out.
    pub fn complete_withdrawal(&self, id: &NodeId, withdrawal: &str) -> Result<WithdrawalRecord> {
        self.settle(id, withdrawal, WithdrawalStatus::Completed)
    }

    /// Mark a processing withdrawal as failed and refund it to income.
    pub fn fail_withdrawal(&self, id: &NodeId, withdrawal: &str) -> Result<WithdrawalRecord> {
        self.settle(id, withdrawal, WithdrawalStatus::Failed)
    }

    fn settle(&self, id: &NodeId, withdrawal: &str, to: WithdrawalStatus) -> Result<WithdrawalRecord> {
        let result = self.update_account(id, |account, now| {
            account.settle_withdrawal(withdrawal, to, now)
        });
        match &result {
            Ok(record) => info!("Withdrawal {} of {} is {}", record.id, id, record.status),
            Err(Error::Durability { .. }) => {}
            Err(e) => warn!("Settling withdrawal {} of {} rejected: {}", withdrawal, id, e),
        }
        result
    }

    /// Every withdrawal of one node, oldest first.
    pub fn withdrawals(&self, id: &NodeId) -> Result<Vec<WithdrawalRecord>> {
        self.read_account(id, |account| account.withdrawals.clone())
    }

    pub fn wallet_entries(&self, id: &NodeId) -> Result<Vec<WalletEntry>> {
        self.read_account(id, |account| account.wallet_log.clone())
    }

    pub fn credit_ledger(&self, id: &NodeId) -> Result<Vec<CreditLedgerEntry>> {
        self.read_account(id, |account| account.credit_ledger.clone())
    }

    /// Processing withdrawals across the network, oldest request first.
    pub fn pending_withdrawals(&self) -> Vec<PendingWithdrawal> {
        let registry = self.registry.read();
        let mut pending = Vec::new();
        for node in registry.tree.nodes() {
            let Ok(account) = self.account(&node.id) else {
                continue;
            };
            let account = account.lock();
            pending.extend(account.pending_withdrawals().map(|record| PendingWithdrawal {
                node: node.id.clone(),
                record: record.clone(),
            }));
        }
        pending.sort_by(|a, b| {
            (a.record.requested_at_ms, &a.record.id).cmp(&(b.record.requested_at_ms, &b.record.id))
        });
        pending
    }
}
