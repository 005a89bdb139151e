//! The forest of founder roots.
//!
//! Nodes live in an arena keyed by id; links are ids, never references. All
//! mutation goes through a handful of primitives that keep parent and child
//! pointers in agreement:
//!
//! - [`Tree::insert_root`] seeds a founder
//! - [`Tree::attach`] claims an empty slot for a fresh node
//! - [`Tree::detach`] / [`Tree::attach_subtree`] move a whole subtree
//! - [`Tree::regraft`] does both after validating the move up front
//! - [`Tree::displace`] claims an occupied slot and pushes the occupant down

use crate::error::{Result, TopologyError};
use crate::search::Levels;
use crate::{Node, NodeId, Role, Side};
use std::collections::{HashMap, HashSet, VecDeque};

/// Arena of nodes plus the ordered root list.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
}

/// A subtree that has been cut loose and must be re-attached.
///
/// Dropping it leaves the subtree unreachable, so it is `must_use`.
#[must_use = "a detached subtree must be re-attached with Tree::attach_subtree"]
#[derive(Debug, PartialEq, Eq)]
pub struct Detached {
    root: NodeId,
}

impl Detached {
    /// Root of the detached subtree.
    pub fn root(&self) -> &NodeId {
        &self.root
    }
}

/// Problems found while rebuilding a tree from flat records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildIssue {
    /// A child pointer named a node that is missing or does not point back
    DanglingChild { parent: NodeId, side: Side, child: NodeId },
    /// A record not reachable from any founder root
    Unreachable(NodeId),
    /// A sponsor or referral pointer naming a missing node
    DanglingSponsor { node: NodeId, sponsor: NodeId },
    /// Stored depth disagreed with the rebuilt structure
    DepthCorrected { node: NodeId, stored: u32, actual: u32 },
}

impl Tree {
    /// Empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes (attached or detached).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Founder roots in bootstrap order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes, unordered.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    fn node(&self, id: &NodeId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.clone()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.clone()))
    }

    /// Seed a root. The node must be fresh.
    pub fn insert_root(&mut self, mut node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(TopologyError::DuplicateNode(node.id));
        }
        if !node.is_fresh() {
            return Err(TopologyError::NotFresh(node.id));
        }
        node.depth = 0;
        self.roots.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Put a fresh node into an empty slot of `parent`.
    pub fn attach(&mut self, parent: &NodeId, side: Side, mut node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(TopologyError::DuplicateNode(node.id));
        }
        if !node.is_fresh() {
            return Err(TopologyError::NotFresh(node.id));
        }
        let host = self.node(parent)?;
        if let Some(occupant) = host.child(side) {
            return Err(TopologyError::SlotOccupied {
                parent: parent.clone(),
                side,
                occupant: occupant.clone(),
            });
        }
        node.depth = host.depth + 1;
        node.parent = Some(parent.clone());

        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        *self.node_mut(parent)?.child_mut(side) = Some(id);
        Ok(())
    }

    /// Cut `id` (and everything under it) out of its parent's slot.
    pub fn detach(&mut self, id: &NodeId) -> Result<Detached> {
        let parent = match &self.node(id)?.parent {
            Some(parent) => parent.clone(),
            None => return Err(TopologyError::RootDetach(id.clone())),
        };
        let host = self.node_mut(&parent)?;
        if let Some(side) = host.side_of(id) {
            *host.child_mut(side) = None;
        }
        self.node_mut(id)?.parent = None;
        Ok(Detached { root: id.clone() })
    }

    /// Re-attach a detached subtree into an empty slot and fix its depths.
    pub fn attach_subtree(&mut self, detached: Detached, parent: &NodeId, side: Side) -> Result<()> {
        let root = detached.root;
        let host = self.node(parent)?;
        if let Some(occupant) = host.child(side) {
            return Err(TopologyError::SlotOccupied {
                parent: parent.clone(),
                side,
                occupant: occupant.clone(),
            });
        }
        if self.is_within(parent, &root) {
            return Err(TopologyError::Cycle {
                subtree: root,
                target: parent.clone(),
            });
        }
        let base = host.depth + 1;
        *self.node_mut(parent)?.child_mut(side) = Some(root.clone());
        self.node_mut(&root)?.parent = Some(parent.clone());
        self.reset_depths(&root, base)
    }

    /// Move the subtree rooted at `id` into an empty slot elsewhere.
    ///
    /// Every precondition is checked before anything is cut, so a failed
    /// regraft leaves the tree untouched.
    pub fn regraft(&mut self, id: &NodeId, new_parent: &NodeId, side: Side) -> Result<()> {
        let node = self.node(id)?;
        if node.is_root() {
            return Err(TopologyError::RootDetach(id.clone()));
        }
        let host = self.node(new_parent)?;
        if let Some(occupant) = host.child(side) {
            return Err(TopologyError::SlotOccupied {
                parent: new_parent.clone(),
                side,
                occupant: occupant.clone(),
            });
        }
        if self.is_within(new_parent, id) {
            return Err(TopologyError::Cycle {
                subtree: id.clone(),
                target: new_parent.clone(),
            });
        }
        let detached = self.detach(id)?;
        self.attach_subtree(detached, new_parent, side)
    }

    /// Put a fresh node into `parent`'s `side` slot. If the slot is held, the
    /// occupant's whole subtree moves under the new node's `push_to` slot.
    ///
    /// Returns the displaced occupant. Validation happens before any link is
    /// cut, so an error leaves the tree untouched.
    pub fn displace(
        &mut self,
        parent: &NodeId,
        side: Side,
        node: Node,
        push_to: Side,
    ) -> Result<Option<NodeId>> {
        if self.nodes.contains_key(&node.id) {
            return Err(TopologyError::DuplicateNode(node.id));
        }
        if !node.is_fresh() {
            return Err(TopologyError::NotFresh(node.id));
        }
        let occupant = match self.node(parent)?.child(side) {
            Some(occupant) => occupant.clone(),
            None => {
                self.attach(parent, side, node)?;
                return Ok(None);
            }
        };

        let incoming = node.id.clone();
        let detached = self.detach(&occupant)?;
        self.attach(parent, side, node)?;
        self.attach_subtree(detached, &incoming, push_to)?;
        Ok(Some(occupant))
    }

    fn reset_depths(&mut self, root: &NodeId, base: u32) -> Result<()> {
        let mut queue = VecDeque::from([(root.clone(), base)]);
        while let Some((id, depth)) = queue.pop_front() {
            let node = self.node_mut(&id)?;
            node.depth = depth;
            for child in node.children() {
                queue.push_back((child.clone(), depth + 1));
            }
        }
        Ok(())
    }

    /// Append `referral` to `sponsor`'s direct referrals and set the back link.
    pub fn record_referral(&mut self, sponsor: &NodeId, referral: &NodeId) -> Result<()> {
        self.node(referral)?;
        let host = self.node_mut(sponsor)?;
        if !host.direct_referrals.contains(referral) {
            host.direct_referrals.push(referral.clone());
        }
        self.node_mut(referral)?.sponsor = Some(sponsor.clone());
        Ok(())
    }

    /// Whether `id` is `ancestor` or lies beneath it.
    pub fn is_within(&self, id: &NodeId, ancestor: &NodeId) -> bool {
        if id == ancestor {
            return true;
        }
        self.ancestors(id).any(|(a, _)| &a.id == ancestor)
    }

    /// Walk from `id` to its root, yielding each ancestor and the side of that
    /// ancestor the walk arrived from.
    pub fn ancestors<'a>(&'a self, id: &NodeId) -> Ancestors<'a> {
        Ancestors {
            tree: self,
            current: self.nodes.get(id),
        }
    }

    /// Nodes of the subtree rooted at `id`, in level order.
    pub fn subtree<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Node> + 'a {
        Levels::from_scope(self, std::slice::from_ref(id))
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    /// Nodes under one leg of `id` (empty if the slot is open).
    pub fn leg<'a>(&'a self, id: &NodeId, side: Side) -> impl Iterator<Item = &'a Node> + 'a {
        let start: Vec<&'a NodeId> = self
            .nodes
            .get(id)
            .and_then(|n| n.child(side))
            .into_iter()
            .collect();
        Levels::from_refs(self, start)
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    /// Full-walk sum of `value` over one leg of `id`.
    pub fn leg_sum<F>(&self, id: &NodeId, side: Side, mut value: F) -> u64
    where
        F: FnMut(&Node) -> u64,
    {
        self.leg(id, side).map(|n| value(n)).sum()
    }

    /// Check every pointer pair and depth. Used by tests and after loads.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for root in &self.roots {
            let node = self.get(root).ok_or(format!("missing root {root}"))?;
            if node.parent.is_some() || node.depth != 0 {
                return Err(format!("root {root} has a parent or nonzero depth"));
            }
            for level in Levels::from_scope(self, std::slice::from_ref(root)) {
                for id in level {
                    if !seen.insert(id.clone()) {
                        return Err(format!("{id} reachable twice"));
                    }
                    let node = self.get(id).ok_or(format!("missing {id}"))?;
                    for side in Side::BOTH {
                        if let Some(child) = node.child(side) {
                            let c = self.get(child).ok_or(format!("dangling {child}"))?;
                            if c.parent.as_ref() != Some(id) {
                                return Err(format!("{child} does not point back to {id}"));
                            }
                            if c.depth != node.depth + 1 {
                                return Err(format!("{child} has depth {}", c.depth));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Rebuild from flat records (e.g. a storage load).
    ///
    /// Founders without a parent become roots in sequence order. Pointers that
    /// do not agree in both directions are dropped, unreachable records are
    /// discarded and depths are recomputed. Every correction is reported.
    pub fn rebuild(records: Vec<Node>) -> (Self, Vec<RebuildIssue>) {
        let mut issues = Vec::new();
        let mut pool: HashMap<NodeId, Node> =
            records.into_iter().map(|n| (n.id.clone(), n)).collect();

        let mut roots: Vec<NodeId> = pool
            .values()
            .filter(|n| n.role == Role::Founder && n.parent.is_none())
            .map(|n| n.id.clone())
            .collect();
        roots.sort_by_key(|id| id.sequence());

        let mut tree = Tree::new();
        let mut queue: VecDeque<(NodeId, u32)> = VecDeque::new();
        for root in &roots {
            queue.push_back((root.clone(), 0));
        }
        tree.roots = roots;

        while let Some((id, depth)) = queue.pop_front() {
            let Some(mut node) = pool.remove(&id) else {
                continue;
            };
            if node.depth != depth {
                issues.push(RebuildIssue::DepthCorrected {
                    node: id.clone(),
                    stored: node.depth,
                    actual: depth,
                });
                node.depth = depth;
            }
            for side in Side::BOTH {
                let Some(child) = node.child(side).cloned() else {
                    continue;
                };
                let agrees = pool
                    .get(&child)
                    .map(|c| c.parent.as_ref() == Some(&id))
                    .unwrap_or(false);
                if agrees {
                    queue.push_back((child, depth + 1));
                } else {
                    issues.push(RebuildIssue::DanglingChild {
                        parent: id.clone(),
                        side,
                        child,
                    });
                    *node.child_mut(side) = None;
                }
            }
            tree.nodes.insert(id, node);
        }

        let mut unreachable: Vec<NodeId> = pool.into_keys().collect();
        unreachable.sort();
        issues.extend(unreachable.into_iter().map(RebuildIssue::Unreachable));

        let known: HashSet<NodeId> = tree.nodes.keys().cloned().collect();
        for node in tree.nodes.values_mut() {
            if let Some(sponsor) = &node.sponsor {
                if !known.contains(sponsor) {
                    issues.push(RebuildIssue::DanglingSponsor {
                        node: node.id.clone(),
                        sponsor: sponsor.clone(),
                    });
                    node.sponsor = None;
                }
            }
            node.direct_referrals.retain(|r| known.contains(r));
        }

        (tree, issues)
    }
}

/// Iterator from a node up to its root. See [`Tree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a Tree,
    current: Option<&'a Node>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = (&'a Node, Side);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        let parent = node.parent.as_ref().and_then(|p| self.tree.nodes.get(p));
        self.current = parent;
        let parent = parent?;
        let side = parent.side_of(&node.id)?;
        Some((parent, side))
    }
}
