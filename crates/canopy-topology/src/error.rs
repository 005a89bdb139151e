//! Structural errors.

use crate::{NodeId, Role, Side};
use thiserror::Error;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Violations of the tree's structural invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// No node with this id exists
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A node with this id is already in the tree
    #[error("node already present: {0}")]
    DuplicateNode(NodeId),

    /// The target slot already holds a node
    #[error("{side} slot of {parent} is occupied by {occupant}")]
    SlotOccupied {
        parent: NodeId,
        side: Side,
        occupant: NodeId,
    },

    /// Roots have no parent slot to leave
    #[error("{0} is a root and cannot be detached")]
    RootDetach(NodeId),

    /// Only fresh nodes (no parent, no children) can be attached directly
    #[error("{0} already carries structural links")]
    NotFresh(NodeId),

    /// The new parent lies inside the subtree being moved
    #[error("moving {subtree} under {target} would create a cycle")]
    Cycle { subtree: NodeId, target: NodeId },

    /// Malformed id string
    #[error("invalid node id: {0:?}")]
    InvalidId(String),

    /// The role's sequence counter cannot advance further
    #[error("no {0} ids left to allocate")]
    SequenceExhausted(Role),
}
