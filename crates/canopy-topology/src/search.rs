//! Level-order slot search.
//!
//! Levels are produced by [`Levels`]: level 0 is the starting set (all roots in
//! bootstrap order, or a single scope root), and level k+1 lists, for each node
//! of level k in order, its left child then its right child.
//!
//! Within a level the scan is two-pass: every node is offered its left slot
//! first, and only when no node of the level can take a left child are right
//! slots offered. The first acceptable slot wins.
//!
//! ```text
//! level 0:   F1            F2
//! level 1: C1    C2      C3    .      <- F2.right is open, but level 2 lefts
//! level 2: .  .  .  .    .  .         are not considered before it
//! ```

use crate::{Node, NodeId, Side, Tree};
use std::mem;

/// Iterator over the levels of a forest or subtree.
pub struct Levels<'a> {
    tree: &'a Tree,
    frontier: Vec<&'a NodeId>,
}

impl<'a> Levels<'a> {
    /// Levels of the whole forest, starting at the roots.
    pub fn new(tree: &'a Tree) -> Self {
        Self::from_scope(tree, tree.roots())
    }

    /// Levels starting from the given nodes.
    pub fn from_scope(tree: &'a Tree, start: &'a [NodeId]) -> Self {
        Self::from_refs(tree, start.iter().collect())
    }

    pub(crate) fn from_refs(tree: &'a Tree, start: Vec<&'a NodeId>) -> Self {
        let frontier = start.into_iter().filter(|id| tree.contains(id)).collect();
        Self { tree, frontier }
    }
}

impl<'a> Iterator for Levels<'a> {
    type Item = Vec<&'a NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.frontier.is_empty() {
            return None;
        }
        let tree = self.tree;
        let next = self
            .frontier
            .iter()
            .filter_map(|id| tree.get(id))
            .flat_map(|node| node.children())
            .collect();
        Some(mem::replace(&mut self.frontier, next))
    }
}

/// Where a search starts.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Every founder root, in bootstrap order
    Everywhere,
    /// Only the subtree rooted at this node
    Subtree(&'a NodeId),
}

/// Eligibility rule for a search.
pub trait SlotFilter {
    /// Whether `parent` may receive a child at all.
    fn hosts(&self, parent: &Node) -> bool;

    /// Whether an occupied slot may be claimed by pushing `occupant` down.
    fn may_displace(&self, _occupant: &Node) -> bool {
        false
    }
}

/// Any node with an empty slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSlot;

impl SlotFilter for OpenSlot {
    fn hosts(&self, _parent: &Node) -> bool {
        true
    }
}

/// Founder or brand-owner parents; customer-held slots may be displaced.
///
/// Customers are never candidates but are still traversed, so founders and
/// brand owners deeper in the tree stay reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrandOwnerSlot;

impl SlotFilter for BrandOwnerSlot {
    fn hosts(&self, parent: &Node) -> bool {
        parent.role.hosts_brand_owners()
    }

    fn may_displace(&self, occupant: &Node) -> bool {
        occupant.role == crate::Role::Customer
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCandidate {
    pub parent: NodeId,
    pub side: Side,
    /// Current holder of the slot, when the filter allows displacement
    pub occupant: Option<NodeId>,
    /// Level of `parent` relative to the search start
    pub level: usize,
}

/// Find the first acceptable slot in level order.
pub fn find_slot<F>(tree: &Tree, scope: Scope<'_>, filter: &F) -> Option<SlotCandidate>
where
    F: SlotFilter + ?Sized,
{
    let levels = match scope {
        Scope::Everywhere => Levels::new(tree),
        Scope::Subtree(root) => Levels::from_scope(tree, std::slice::from_ref(root)),
    };

    for (level, ids) in levels.enumerate() {
        let hosts: Vec<&Node> = ids
            .iter()
            .filter_map(|id| tree.get(id))
            .filter(|node| filter.hosts(node))
            .collect();

        for side in Side::BOTH {
            for node in &hosts {
                let occupant = node.child(side).and_then(|c| tree.get(c));
                match occupant {
                    None => {
                        return Some(SlotCandidate {
                            parent: node.id.clone(),
                            side,
                            occupant: None,
                            level,
                        })
                    }
                    Some(held) if filter.may_displace(held) => {
                        return Some(SlotCandidate {
                            parent: node.id.clone(),
                            side,
                            occupant: Some(held.id.clone()),
                            level,
                        })
                    }
                    Some(_) => {}
                }
            }
        }
    }
    None
}

/// Resumable whole-forest search for [`OpenSlot`].
///
/// Holds the shallowest level that may still have an open slot and how far
/// each pass over it has got. Attaching a child never opens a slot at or above
/// that level, so successive searches pick up where the last one stopped and
/// each level is scanned once. Adding a root or regrafting a subtree breaks
/// that; call [`OpenSlotCursor::reset`] after either.
#[derive(Debug, Clone, Default)]
pub struct OpenSlotCursor {
    primed: bool,
    level: usize,
    ids: Vec<NodeId>,
    pass: usize,
    pos: usize,
}

impl OpenSlotCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart the next search from the roots.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Same answer as `find_slot(tree, Scope::Everywhere, &OpenSlot)`.
    ///
    /// The returned slot stays under the cursor until it is filled.
    pub fn next_slot(&mut self, tree: &Tree) -> Option<SlotCandidate> {
        if !self.primed {
            self.ids = tree.roots().iter().filter(|id| tree.contains(id)).cloned().collect();
            self.primed = true;
        }
        while !self.ids.is_empty() {
            while let Some(&side) = Side::BOTH.get(self.pass) {
                while let Some(id) = self.ids.get(self.pos) {
                    let open = tree
                        .get(id)
                        .is_some_and(|node| node.child(side).and_then(|c| tree.get(c)).is_none());
                    if open {
                        return Some(SlotCandidate {
                            parent: id.clone(),
                            side,
                            occupant: None,
                            level: self.level,
                        });
                    }
                    self.pos += 1;
                }
                self.pass += 1;
                self.pos = 0;
            }
            self.ids = self
                .ids
                .iter()
                .filter_map(|id| tree.get(id))
                .flat_map(|node| node.children().cloned())
                .collect();
            self.level += 1;
            self.pass = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdAllocator, Role};
    use proptest::prelude::*;

    fn forest(founders: usize) -> (Tree, IdAllocator) {
        let mut tree = Tree::new();
        let mut ids = IdAllocator::new();
        for _ in 0..founders {
            let id = ids.allocate(Role::Founder).unwrap();
            tree.insert_root(Node::new(id, "founder", "f")).unwrap();
        }
        (tree, ids)
    }

    fn place(tree: &mut Tree, ids: &mut IdAllocator, scope: Option<&NodeId>) -> SlotCandidate {
        let scope = scope.map(Scope::Subtree).unwrap_or(Scope::Everywhere);
        let slot = find_slot(tree, scope, &OpenSlot).unwrap();
        let id = ids.allocate(Role::Customer).unwrap();
        tree.attach(&slot.parent, slot.side, Node::new(id, "c", "c")).unwrap();
        slot
    }

    #[test]
    fn empty_forest_uses_first_founder_left() {
        let (tree, _) = forest(3);
        let slot = find_slot(&tree, Scope::Everywhere, &OpenSlot).unwrap();
        assert_eq!(slot.parent, NodeId::new(Role::Founder, 1));
        assert_eq!(slot.side, Side::Left);
        assert_eq!(slot.level, 0);
    }

    #[test]
    fn lefts_of_a_level_fill_before_rights() {
        let (mut tree, mut ids) = forest(2);
        let order: Vec<(NodeId, Side)> = (0..4)
            .map(|_| {
                let s = place(&mut tree, &mut ids, None);
                (s.parent, s.side)
            })
            .collect();
        let f1 = NodeId::new(Role::Founder, 1);
        let f2 = NodeId::new(Role::Founder, 2);
        assert_eq!(
            order,
            vec![
                (f1.clone(), Side::Left),
                (f2.clone(), Side::Left),
                (f1, Side::Right),
                (f2, Side::Right),
            ]
        );
    }

    #[test]
    fn no_slot_in_empty_tree() {
        let tree = Tree::new();
        assert!(find_slot(&tree, Scope::Everywhere, &OpenSlot).is_none());
    }

    #[test]
    fn scoped_search_stays_in_subtree() {
        let (mut tree, mut ids) = forest(1);
        for _ in 0..6 {
            place(&mut tree, &mut ids, None);
        }
        // CUS000002 is the founder's right child; both its slots are taken.
        let sponsor = NodeId::new(Role::Customer, 2);
        assert!(tree.get(&sponsor).unwrap().children().count() == 2);
        let slot = place(&mut tree, &mut ids, Some(&sponsor));
        assert!(tree.is_within(&slot.parent, &sponsor));
        assert_eq!(slot.level, 1);
    }

    #[test]
    fn brand_owner_filter_offers_customer_held_slot() {
        let (mut tree, mut ids) = forest(1);
        let f1 = NodeId::new(Role::Founder, 1);
        for side in Side::BOTH {
            let id = ids.allocate(Role::BrandOwner).unwrap();
            tree.attach(&f1, side, Node::new(id, "b", "b")).unwrap();
        }
        let b1 = NodeId::new(Role::BrandOwner, 1);
        let b2 = NodeId::new(Role::BrandOwner, 2);
        for parent in [&b1, &b2] {
            for side in Side::BOTH {
                let id = ids.allocate(Role::BrandOwner).unwrap();
                tree.attach(parent, side, Node::new(id, "b", "b")).unwrap();
            }
        }
        let b4 = NodeId::new(Role::BrandOwner, 4);
        let cus = ids.allocate(Role::Customer).unwrap();
        tree.attach(&b4, Side::Left, Node::new(cus.clone(), "c", "c")).unwrap();

        // Level 2 is B3..B6; B3.left is open and comes first
        let slot = find_slot(&tree, Scope::Everywhere, &BrandOwnerSlot).unwrap();
        assert_eq!(slot.parent, NodeId::new(Role::BrandOwner, 3));
        assert_eq!(slot.occupant, None);

        // Fill B3.left with a brand owner: B4.left (customer) is next
        let id = ids.allocate(Role::BrandOwner).unwrap();
        tree.attach(&NodeId::new(Role::BrandOwner, 3), Side::Left, Node::new(id, "b", "b"))
            .unwrap();
        let slot = find_slot(&tree, Scope::Everywhere, &BrandOwnerSlot).unwrap();
        assert_eq!(slot.parent, b4);
        assert_eq!(slot.side, Side::Left);
        assert_eq!(slot.occupant, Some(cus));
    }

    /// Same hosts as [`BrandOwnerSlot`], never displaces.
    struct HostsOnly;

    impl SlotFilter for HostsOnly {
        fn hosts(&self, parent: &Node) -> bool {
            BrandOwnerSlot.hosts(parent)
        }
    }

    #[test]
    fn customers_are_traversed_but_never_host() {
        let (mut tree, mut ids) = forest(1);
        let f1 = NodeId::new(Role::Founder, 1);
        for side in Side::BOTH {
            let id = ids.allocate(Role::Customer).unwrap();
            tree.attach(&f1, side, Node::new(id, "c", "c")).unwrap();
        }
        // A brand owner sitting below a customer with open slots
        let c1 = NodeId::new(Role::Customer, 1);
        let b1 = ids.allocate(Role::BrandOwner).unwrap();
        tree.attach(&c1, Side::Left, Node::new(b1.clone(), "b", "b")).unwrap();

        let slot = find_slot(&tree, Scope::Everywhere, &HostsOnly).unwrap();
        assert_eq!(slot.parent, b1);
        assert_eq!(slot.side, Side::Left);
        assert_eq!(slot.level, 2);

        // Nothing eligible once the brand owner is full
        for side in Side::BOTH {
            let id = ids.allocate(Role::Customer).unwrap();
            tree.attach(&b1, side, Node::new(id, "c", "c")).unwrap();
        }
        assert!(find_slot(&tree, Scope::Everywhere, &HostsOnly).is_none());
    }

    #[test]
    fn cursor_resumes_after_filled_levels() {
        let (mut tree, mut ids) = forest(2);
        let mut cursor = OpenSlotCursor::new();
        for _ in 0..10 {
            let slot = cursor.next_slot(&tree).unwrap();
            assert_eq!(Some(&slot), find_slot(&tree, Scope::Everywhere, &OpenSlot).as_ref());
            let id = ids.allocate(Role::Customer).unwrap();
            tree.attach(&slot.parent, slot.side, Node::new(id, "c", "c")).unwrap();
        }
        // Parents on levels 0 and 1 offer twelve slots; ten are taken
        assert_eq!(cursor.level, 1);

        // An unfilled answer is offered again
        let first = cursor.next_slot(&tree).unwrap();
        assert_eq!(cursor.next_slot(&tree), Some(first));

        // A new root opens slots above the cursor until it is reset
        let root = ids.allocate(Role::Founder).unwrap();
        tree.insert_root(Node::new(root.clone(), "founder", "f")).unwrap();
        cursor.reset();
        let slot = cursor.next_slot(&tree).unwrap();
        assert_eq!((slot.parent, slot.side, slot.level), (root, Side::Left, 0));
    }

    #[test]
    fn cursor_on_empty_forest_finds_nothing() {
        let mut cursor = OpenSlotCursor::new();
        assert!(cursor.next_slot(&Tree::new()).is_none());
    }

    proptest! {
        #[test]
        fn unsponsored_placement_is_level_ordered(founders in 1usize..4, count in 1usize..80) {
            let (mut tree, mut ids) = forest(founders);
            let mut placed: Vec<(usize, Side)> = Vec::new();
            for _ in 0..count {
                let slot = place(&mut tree, &mut ids, None);
                placed.push((slot.level, slot.side));
            }
            for pair in placed.windows(2) {
                let (l0, s0) = pair[0];
                let (l1, s1) = pair[1];
                prop_assert!(l1 >= l0, "level went backwards");
                if l1 == l0 && s0 == Side::Right {
                    prop_assert_eq!(s1, Side::Right, "left slot filled after a right on the same level");
                }
            }
            prop_assert!(tree.validate().is_ok());
        }

        #[test]
        fn cursor_agrees_with_full_search(founders in 1usize..4, picks in prop::collection::vec(prop::option::of(0u64..200), 1..80)) {
            let (mut tree, mut ids) = forest(founders);
            let mut cursor = OpenSlotCursor::new();
            let mut placed = 0u64;
            for pick in picks {
                // Scoped placements fill slots behind the cursor's back
                let sponsor = pick.filter(|_| placed > 0).map(|p| NodeId::new(Role::Customer, 1 + p % placed));
                if let Some(sponsor) = sponsor {
                    place(&mut tree, &mut ids, Some(&sponsor));
                } else {
                    let expected = find_slot(&tree, Scope::Everywhere, &OpenSlot);
                    let slot = cursor.next_slot(&tree);
                    prop_assert_eq!(&slot, &expected);
                    let slot = slot.unwrap();
                    let id = ids.allocate(Role::Customer).unwrap();
                    tree.attach(&slot.parent, slot.side, Node::new(id, "c", "c")).unwrap();
                }
                placed += 1;
            }
        }

        #[test]
        fn scoped_placement_never_leaves_scope(count in 1usize..40, pick in 0u64..20, extra in 1usize..20) {
            let (mut tree, mut ids) = forest(2);
            for _ in 0..count {
                place(&mut tree, &mut ids, None);
            }
            let sponsor = NodeId::new(Role::Customer, 1 + pick % count as u64);
            for _ in 0..extra {
                let slot = place(&mut tree, &mut ids, Some(&sponsor));
                prop_assert!(tree.is_within(&slot.parent, &sponsor));
            }
        }
    }
}
