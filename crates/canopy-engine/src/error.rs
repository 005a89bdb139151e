//! Error types for the Canopy engine.

use crate::account::WithdrawalStatus;
use canopy_payout::Money;
use canopy_topology::{NodeId, Role, TopologyError};
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Contact is already registered to another node
    #[error("Contact already registered: {0}")]
    DuplicateContact(String),

    /// Named sponsor does not exist
    #[error("Sponsor does not exist: {0}")]
    InvalidSponsor(String),

    /// No slot satisfies the placement rule
    #[error("No eligible slot for a new {0}")]
    NoEligibleSlot(Role),

    /// Amount outside the accepted range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Withdrawal larger than the income balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Money, available: Money },

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Withdrawal already left the processing state
    #[error("Withdrawal {id} is {from}, cannot become {to}")]
    InvalidTransition {
        id: String,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The mutation is applied in memory but some records were not persisted.
    /// They stay queued until a flush succeeds.
    #[error("Applied but not persisted for {nodes:?}: {reason}")]
    Durability { nodes: Vec<NodeId>, reason: String },

    /// Structural error from the tree
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl Error {
    pub(crate) fn unknown(id: &NodeId) -> Self {
        Error::NotFound(format!("node {}", id))
    }
}
