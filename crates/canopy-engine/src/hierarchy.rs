//! Read-only structural views for dashboards.

use crate::error::{Error, Result};
use crate::network::Network;
use canopy_payout::Money;
use canopy_topology::{NodeId, Role, Side, Tree};
use serde::Serialize;

/// Deepest hierarchy a single request may expand.
pub const MAX_HIERARCHY_DEPTH: u32 = 16;

/// One node of a hierarchy view with its children expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub name: String,
    pub role: Role,
    pub depth: u32,
    pub sponsor: Option<NodeId>,
    pub leg_a_sales: Money,
    pub leg_b_sales: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<HierarchyNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<HierarchyNode>>,
    /// Children exist below the expansion limit
    pub truncated: bool,
}

/// Member of one leg (franchise) of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FranchiseMember {
    pub id: NodeId,
    pub name: String,
    pub role: Role,
    /// Levels below the node whose franchise this is
    pub level: u32,
    pub sponsor: Option<NodeId>,
    pub purchase_value: Money,
}

impl Network {
    /// Tree below `root`, expanded `levels` deep (capped at
    /// [`MAX_HIERARCHY_DEPTH`]).
    pub fn hierarchy(&self, root: &NodeId, levels: u32) -> Result<HierarchyNode> {
        let registry = self.registry.read();
        self.expand(&registry.tree, root, levels.min(MAX_HIERARCHY_DEPTH))
    }

    fn expand(&self, tree: &Tree, id: &NodeId, remaining: u32) -> Result<HierarchyNode> {
        let node = tree.get(id).ok_or_else(|| Error::unknown(id))?;
        let (leg_a_sales, leg_b_sales) = {
            let account = self.account(id)?;
            let account = account.lock();
            (account.leg_a_sales, account.leg_b_sales)
        };

        let mut view = HierarchyNode {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role,
            depth: node.depth,
            sponsor: node.sponsor.clone(),
            leg_a_sales,
            leg_b_sales,
            left: None,
            right: None,
            truncated: false,
        };
        if remaining == 0 {
            view.truncated = node.children().next().is_some();
            return Ok(view);
        }
        if let Some(child) = &node.left {
            view.left = Some(Box::new(self.expand(tree, child, remaining - 1)?));
        }
        if let Some(child) = &node.right {
            view.right = Some(Box::new(self.expand(tree, child, remaining - 1)?));
        }
        Ok(view)
    }

    /// Everyone in one leg of `id`, in level order.
    pub fn franchise(&self, id: &NodeId, side: Side) -> Result<Vec<FranchiseMember>> {
        let registry = self.registry.read();
        let base = registry.tree.get(id).ok_or_else(|| Error::unknown(id))?.depth;
        registry
            .tree
            .leg(id, side)
            .map(|node| {
                let purchase_value = self.account(&node.id)?.lock().purchase_value;
                Ok(FranchiseMember {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    role: node.role,
                    level: node.depth.saturating_sub(base),
                    sponsor: node.sponsor.clone(),
                    purchase_value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn seeded(customers: u64) -> Network {
        let network = Network::in_memory(EngineConfig::default()).unwrap();
        for n in 1..=customers {
            network
                .register_customer(&format!("C{n}"), &format!("c{n}@example.com"), None)
                .unwrap();
        }
        network
    }

    fn founder() -> NodeId {
        NodeId::new(Role::Founder, 1)
    }

    #[test]
    fn hierarchy_expands_to_requested_depth() {
        let network = seeded(6);
        let view = network.hierarchy(&founder(), 1).unwrap();
        let left = view.left.as_ref().unwrap();
        assert_eq!(left.id, NodeId::new(Role::Customer, 1));
        assert!(left.left.is_none());
        assert!(left.truncated);
        assert!(!view.truncated);

        let full = network.hierarchy(&founder(), 5).unwrap();
        let c3 = full.left.as_ref().unwrap().left.as_ref().unwrap();
        assert_eq!(c3.id, NodeId::new(Role::Customer, 3));
        assert_eq!(c3.depth, 2);
        assert!(!c3.truncated);
    }

    #[test]
    fn franchise_lists_one_leg_in_level_order() {
        let network = seeded(6);
        let left: Vec<_> = network
            .franchise(&founder(), Side::Left)
            .unwrap()
            .into_iter()
            .map(|m| (m.id.sequence(), m.level))
            .collect();
        assert_eq!(left, vec![(1, 1), (3, 2), (5, 2)]);
        let right = network.franchise(&founder(), Side::Right).unwrap();
        assert_eq!(right.len(), 3);
        assert!(network.franchise(&NodeId::new(Role::Customer, 6), Side::Left).unwrap().is_empty());
    }

    #[test]
    fn unknown_root_is_not_found() {
        let network = seeded(0);
        assert!(matches!(
            network.hierarchy(&NodeId::new(Role::Customer, 1), 3),
            Err(Error::NotFound(_))
        ));
    }
}
