//! Canopy - Referral Network Engine
//!
//! Places founders, customers and brand owners into a binary referral tree,
//! tracks leg turnover up the ancestor chain, and keeps each node's wallet.
//!
//! # Architecture
//!
//! - **Network**: shared engine state (tree, accounts, pending saves)
//! - **Placement**: level-order slot search and brand-owner displacement
//! - **Turnover**: purchase propagation, reward credits and matching income
//! - **Wallet**: top-ups and the withdrawal lifecycle
//! - **Storage**: RocksDB-backed node snapshots
//! - **API**: HTTP endpoints for dashboards and registration
//! - **Admin Socket**: Unix socket for local admin commands (canopy-admin CLI)
//!
//! # Example
//!
//! ```no_run
//! use canopy_engine::{CanopyNode, NodeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = CanopyNode::new(config).await?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod admin_socket;
pub mod api;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod network;
pub mod node;
pub mod placement;
pub mod registry;
pub mod snapshot;
pub mod storage;
pub mod turnover;
pub mod wallet;

pub use account::{
    Account, CreditLedgerEntry, WalletEntry, WalletEntryKind, WithdrawalRecord, WithdrawalStatus,
};
pub use config::{EngineConfig, FounderSeed, NodeConfig};
pub use error::{Error, Result};
pub use hierarchy::{FranchiseMember, HierarchyNode, MAX_HIERARCHY_DEPTH};
pub use network::Network;
pub use node::CanopyNode;
pub use placement::Placement;
pub use snapshot::{NodeSnapshot, NodeView};
pub use storage::{MemoryStore, NodeStore, RocksStore};
pub use turnover::{CreditAward, MatchPayout, PurchaseReceipt, SponsorCredit, TurnoverSummary};
pub use wallet::PendingWithdrawal;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
