//! Canopy Tree Topology
//!
//! Rooted binary trees for a referral network, with level-order slot search
//! and a single subtree regraft primitive.
//!
//! # Structure
//!
//! A network is a forest of founder roots. Every node occupies at most one
//! child slot under exactly one structural parent and owns two slots of its
//! own:
//! - Left slot (Franchise A)
//! - Right slot (Franchise B)
//!
//! The structural parent is separate from the sponsor. Sponsorship records who
//! recruited a node; the parent records where it sits.
//!
//! # Level-Order Placement
//!
//! New nodes claim the first open slot in a deterministic level-order scan:
//! roots in bootstrap order, then left child before right child at every node.
//! Within one level every open left slot is taken before any open right slot.
//! Eligibility is pluggable through [`SlotFilter`].
//!
//! # Regrafting
//!
//! Slots are written once. The only way a slot is vacated is [`Tree::detach`]
//! followed by [`Tree::attach_subtree`] (or the combined [`Tree::regraft`]),
//! which moves a whole subtree and recomputes its depths. [`Tree::displace`]
//! uses them to push a slot's occupant down under a newcomer.

mod error;
mod id;
mod node;
mod search;
mod tree;

pub use error::{Result, TopologyError};
pub use id::{IdAllocator, NodeId, Role};
pub use node::{Node, Side};
pub use search::{
    find_slot, BrandOwnerSlot, Levels, OpenSlot, OpenSlotCursor, Scope, SlotCandidate, SlotFilter,
};
pub use tree::{Ancestors, Detached, RebuildIssue, Tree};

/// Child slots owned by every node (invariant: binary tree)
pub const SLOTS_PER_NODE: usize = 2;

/// Digits in the numeric part of a node id (`CUS000042`)
pub const ID_DIGITS: usize = 6;

/// Length of the role prefix in a node id
pub const ID_PREFIX_LEN: usize = 3;

const _: () = assert!(SLOTS_PER_NODE == Side::BOTH.len());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_invariant() {
        assert_eq!(Side::BOTH.len(), SLOTS_PER_NODE);
        assert_eq!(Side::BOTH[0], Side::Left);
    }

    #[test]
    fn id_layout() {
        let id = NodeId::new(Role::Customer, 42);
        assert_eq!(id.as_str().len(), ID_PREFIX_LEN + ID_DIGITS);
    }
}
