//! Flat node records: what the store holds and what the API returns.

use crate::account::Account;
use canopy_payout::Money;
use canopy_topology::{Node, NodeId, Role};
use serde::{Deserialize, Serialize};

/// Current record layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Structural and financial state of one node, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(flatten)]
    pub node: Node,
    #[serde(flatten)]
    pub account: Account,
}

impl NodeSnapshot {
    pub fn new(node: &Node, account: &Account) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            node: node.clone(),
            account: account.clone(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn into_parts(self) -> (Node, Account) {
        (self.node, self.account)
    }
}

/// Dashboard view of a node: position and balances, without the logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub contact: String,
    pub role: Role,
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub sponsor: Option<NodeId>,
    pub direct_referrals: Vec<NodeId>,
    pub purchase_value: Money,
    pub leg_a_sales: Money,
    pub leg_b_sales: Money,
    pub income_balance: Money,
    pub spendable_balance: Money,
    pub reward_credits: u64,
}

impl NodeView {
    pub fn new(node: &Node, account: &Account) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            contact: node.contact.clone(),
            role: node.role,
            depth: node.depth,
            parent: node.parent.clone(),
            left: node.left.clone(),
            right: node.right.clone(),
            sponsor: node.sponsor.clone(),
            direct_referrals: node.direct_referrals.clone(),
            purchase_value: account.purchase_value,
            leg_a_sales: account.leg_a_sales,
            leg_b_sales: account.leg_b_sales,
            income_balance: account.income_balance,
            spendable_balance: account.spendable_balance,
            reward_credits: account.reward_credits,
        }
    }
}

impl From<&NodeSnapshot> for NodeView {
    fn from(snapshot: &NodeSnapshot) -> Self {
        Self::new(&snapshot.node, &snapshot.account)
    }
}
