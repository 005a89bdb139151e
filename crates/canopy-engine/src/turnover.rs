//! Turnover aggregation.
//!
//! Leg sales are maintained incrementally: a purchase adds its value to every
//! ancestor on the side it arrived from. The full-walk variant recomputes the
//! same number from purchase values and exists to check the incremental one.

use crate::account::WalletEntryKind;
use crate::error::{Error, Result};
use crate::network::{Network, SaveReport};
use crate::now_ms;
use canopy_payout::Money;
use canopy_topology::{NodeId, Side, Tree};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Reward credits awarded to one ancestor by a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditAward {
    pub node: NodeId,
    pub leg: Side,
    pub credits: u64,
    pub total: u64,
}

/// Matching payout triggered by a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPayout {
    pub node: NodeId,
    pub matched: Money,
    pub payout: Money,
}

/// Sponsor bonus credited for a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SponsorCredit {
    pub node: NodeId,
    pub amount: Money,
}

/// Everything one purchase changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub node: NodeId,
    pub value: Money,
    /// Ancestors whose leg sales grew
    pub ancestors: usize,
    pub credits: Vec<CreditAward>,
    pub matches: Vec<MatchPayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_bonus: Option<SponsorCredit>,
}

/// Turnover and credit state of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnoverSummary {
    pub node: NodeId,
    pub purchase_value: Money,
    pub leg_a_sales: Money,
    pub leg_b_sales: Money,
    pub carry_forward_a: Money,
    pub carry_forward_b: Money,
    pub reward_credits: u64,
    pub credits_leg_a: u64,
    pub credits_leg_b: u64,
    /// Leg turnover at which the next credit lands
    pub next_credit_at_a: Option<Money>,
    pub next_credit_at_b: Option<Money>,
}

impl Network {
    /// Add a purchase by `node` and propagate it up the tree.
    pub fn record_purchase(&self, node: &NodeId, value: Money) -> Result<PurchaseReceipt> {
        if value.is_zero() {
            return Err(Error::OutOfRange("purchase value must be positive".into()));
        }
        let registry = self.registry.read();
        let _serial = self.purchases.lock();
        let tree = &registry.tree;
        let buyer = tree.get(node).ok_or_else(|| Error::unknown(node))?;
        let now = now_ms();
        let mut report = SaveReport::default();

        {
            let account = self.account(node)?;
            let mut account = account.lock();
            account.purchase_value += value;
            self.save_locked(buyer, &account, &mut report);
        }

        let mut receipt = PurchaseReceipt {
            node: node.clone(),
            value,
            ancestors: 0,
            credits: Vec::new(),
            matches: Vec::new(),
            sponsor_bonus: None,
        };

        for (ancestor, side) in tree.ancestors(node) {
            let account = self.account(&ancestor.id)?;
            let mut account = account.lock();
            account.add_leg_volume(side, value);
            receipt.ancestors += 1;

            if let Some(entry) = account.award_credits(side, &self.config.slabs, now) {
                info!(
                    "{} earned {} credits on leg {} (total {})",
                    ancestor.id,
                    entry.credits_earned,
                    side.leg(),
                    entry.running_total
                );
                receipt.credits.push(CreditAward {
                    node: ancestor.id.clone(),
                    leg: side,
                    credits: entry.credits_earned,
                    total: entry.running_total,
                });
            }
            if let Some(outcome) = account.run_matching(&self.config.matching, now) {
                info!(
                    "{} matched {}, paid {}",
                    ancestor.id, outcome.matched, outcome.payout
                );
                receipt.matches.push(MatchPayout {
                    node: ancestor.id.clone(),
                    matched: outcome.matched,
                    payout: outcome.payout,
                });
            }
            self.save_locked(ancestor, &account, &mut report);
        }

        if let Some(sponsor) = buyer.sponsor.as_ref().and_then(|id| tree.get(id)) {
            let bonus = self.config.sponsor_bonus.bonus_for(value);
            if !bonus.is_zero() {
                let account = self.account(&sponsor.id)?;
                let mut account = account.lock();
                account.credit_income(WalletEntryKind::SponsorBonus, bonus, now, Some(node.to_string()));
                self.save_locked(sponsor, &account, &mut report);
                receipt.sponsor_bonus = Some(SponsorCredit {
                    node: sponsor.id.clone(),
                    amount: bonus,
                });
            }
        }

        info!(
            "Purchase of {} by {} reached {} ancestors",
            value, node, receipt.ancestors
        );
        report.finish()?;
        Ok(receipt)
    }

    /// Incrementally maintained turnover of one leg.
    pub fn leg_turnover(&self, node: &NodeId, side: Side) -> Result<Money> {
        let _registry = self.registry.read();
        let account = self.account(node)?;
        let sales = account.lock().leg_sales(side);
        Ok(sales)
    }

    /// Turnover of one leg recomputed from every purchase in it.
    pub fn leg_turnover_full_walk(&self, node: &NodeId, side: Side) -> Result<Money> {
        let registry = self.registry.read();
        let _serial = self.purchases.lock();
        if !registry.tree.contains(node) {
            return Err(Error::unknown(node));
        }
        registry
            .tree
            .leg(node, side)
            .map(|n| self.account(&n.id).map(|a| a.lock().purchase_value))
            .sum()
    }

    pub fn turnover_summary(&self, node: &NodeId) -> Result<TurnoverSummary> {
        let _registry = self.registry.read();
        let account = self.account(node)?;
        let account = account.lock();
        let slabs = &self.config.slabs;
        Ok(TurnoverSummary {
            node: node.clone(),
            purchase_value: account.purchase_value,
            leg_a_sales: account.leg_a_sales,
            leg_b_sales: account.leg_b_sales,
            carry_forward_a: account.carry_forward_a,
            carry_forward_b: account.carry_forward_b,
            reward_credits: account.reward_credits,
            credits_leg_a: account.credits_leg_a,
            credits_leg_b: account.credits_leg_b,
            next_credit_at_a: slabs.next_threshold(account.leg_a_sales),
            next_credit_at_b: slabs.next_threshold(account.leg_b_sales),
        })
    }

    /// Total purchases inside the subtree rooted at `root`.
    pub(crate) fn subtree_turnover(&self, tree: &Tree, root: &NodeId) -> Result<Money> {
        tree.subtree(root)
            .map(|n| self.account(&n.id).map(|a| a.lock().purchase_value))
            .sum()
    }

    /// Move the subtree at `root` with `regraft`, taking its turnover out of
    /// the old ancestor chain and adding it to the new one.
    ///
    /// Matching carry is not moved: only volume that arrives after the move
    /// is matched in the new position. Inbound legs are re-evaluated for
    /// credits. Returns `regraft`'s result and every node whose record
    /// changed.
    pub(crate) fn rebase_subtree<T, F>(
        &self,
        tree: &mut Tree,
        root: &NodeId,
        regraft: F,
    ) -> Result<(T, BTreeSet<NodeId>)>
    where
        F: FnOnce(&mut Tree) -> Result<T>,
    {
        let volume = self.subtree_turnover(tree, root)?;
        let now = now_ms();
        let mut touched = BTreeSet::new();

        self.shift_ancestors(tree, root, volume, false, now, &mut touched)?;
        let moved = match regraft(tree) {
            Ok(moved) => moved,
            Err(e) => {
                self.shift_ancestors(tree, root, volume, true, now, &mut BTreeSet::new())?;
                return Err(e);
            }
        };
        self.shift_ancestors(tree, root, volume, true, now, &mut touched)?;

        touched.extend(tree.subtree(root).map(|n| n.id.clone()));
        debug!("Rebased {} of turnover under {}", volume, root);
        Ok((moved, touched))
    }

    fn shift_ancestors(
        &self,
        tree: &Tree,
        root: &NodeId,
        volume: Money,
        inbound: bool,
        now: u64,
        touched: &mut BTreeSet<NodeId>,
    ) -> Result<()> {
        for (ancestor, side) in tree.ancestors(root) {
            let account = self.account(&ancestor.id)?;
            let mut account = account.lock();
            account.shift_leg_turnover(side, volume, inbound);
            if inbound {
                if let Some(entry) = account.award_credits(side, &self.config.slabs, now) {
                    info!(
                        "{} earned {} credits on leg {} from a moved subtree",
                        ancestor.id,
                        entry.credits_earned,
                        side.leg()
                    );
                }
            }
            touched.insert(ancestor.id.clone());
        }
        Ok(())
    }
}
