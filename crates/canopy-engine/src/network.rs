//! The engine handle.
//!
//! Lock order, outermost first:
//!
//! 1. `registry` (structure; write for registrations, read for everything else)
//! 2. `purchases` (serialises purchase propagation)
//! 3. `accounts` (the map; held only long enough to clone an entry)
//! 4. one account's `Mutex`
//!
//! `pending` is a leaf lock. No lock is held across an `.await`.

use crate::account::Account;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::snapshot::NodeSnapshot;
use crate::storage::{MemoryStore, NodeStore};
use canopy_topology::{Node, NodeId, RebuildIssue, Tree};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry, accounts and persistence behind one shareable value.
pub struct Network {
    pub(crate) config: EngineConfig,
    pub(crate) registry: RwLock<Registry>,
    accounts: RwLock<HashMap<NodeId, Arc<Mutex<Account>>>>,
    pub(crate) purchases: Mutex<()>,
    store: Arc<dyn NodeStore>,
    pending: Mutex<BTreeSet<NodeId>>,
}

impl Network {
    /// Load every stored record, rebuild the tree and seed founders if none
    /// survived.
    pub fn open(config: EngineConfig, store: Arc<dyn NodeStore>) -> Result<Self> {
        config.validate()?;

        let records = store.load_all_nodes()?;
        let loaded = records.len();
        let seen: Vec<NodeId> = records.iter().map(|r| r.id().clone()).collect();

        let mut nodes = Vec::with_capacity(loaded);
        let mut accounts = HashMap::with_capacity(loaded);
        for record in records {
            let (node, account) = record.into_parts();
            accounts.insert(node.id.clone(), Arc::new(Mutex::new(account)));
            nodes.push(node);
        }

        let (tree, issues) = Tree::rebuild(nodes);
        for issue in &issues {
            warn!("Repaired stored record: {}", describe(issue));
        }
        accounts.retain(|id, _| tree.contains(id));

        let network = Self {
            registry: RwLock::new(Registry::from_tree(tree, &seen)),
            accounts: RwLock::new(accounts),
            purchases: Mutex::new(()),
            pending: Mutex::new(BTreeSet::new()),
            config,
            store,
        };

        let repaired: BTreeSet<NodeId> = issues.iter().filter_map(repaired_node).collect();
        if !repaired.is_empty() {
            let registry = network.registry.read();
            network.persist_nodes(&registry.tree, &repaired)?;
        }

        let has_founder = !network.registry.read().tree.roots().is_empty();
        if !has_founder {
            info!("No founder in storage, seeding {}", network.config.founders.len());
            for seed in network.config.founders.clone() {
                network.attach_founder(&seed.name, &seed.contact)?;
            }
        }

        info!(
            "Network open: {} nodes ({} stored, {} dropped)",
            network.len(),
            loaded,
            issues
                .iter()
                .filter(|i| matches!(i, RebuildIssue::Unreachable(_)))
                .count()
        );
        Ok(network)
    }

    /// Engine over a fresh in-memory store.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::open(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Accounts ---

    pub(crate) fn account(&self, id: &NodeId) -> Result<Arc<Mutex<Account>>> {
        self.accounts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::unknown(id))
    }

    pub(crate) fn open_account(&self, id: &NodeId) -> Arc<Mutex<Account>> {
        Arc::clone(self.accounts.write().entry(id.clone()).or_default())
    }

    pub(crate) fn discard_account(&self, id: &NodeId) {
        self.accounts.write().remove(id);
    }

    pub(crate) fn snapshot_in(&self, tree: &Tree, id: &NodeId) -> Result<NodeSnapshot> {
        let node = tree.get(id).ok_or_else(|| Error::unknown(id))?;
        let account = self.account(id)?;
        let account = account.lock();
        Ok(NodeSnapshot::new(node, &account))
    }

    // --- Persistence ---

    /// Save one node while its account lock is held.
    pub(crate) fn save_locked(&self, node: &Node, account: &Account, report: &mut SaveReport) {
        let snapshot = NodeSnapshot::new(node, account);
        report.record(node.id.clone(), self.save_with_retry(&snapshot));
    }

    /// Save each listed node, locking its account in turn.
    pub(crate) fn persist_nodes<'a, I>(&self, tree: &Tree, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let ids: BTreeSet<&NodeId> = ids.into_iter().collect();
        let mut report = SaveReport::default();
        for id in ids {
            let Some(node) = tree.get(id) else {
                // Dropped from the tree; nothing left to write
                self.pending.lock().remove(id);
                continue;
            };
            let account = self.account(id)?;
            let account = account.lock();
            self.save_locked(node, &account, &mut report);
        }
        report.finish()
    }

    fn save_with_retry(&self, snapshot: &NodeSnapshot) -> Result<()> {
        let id = snapshot.id();
        let mut attempt = 0;
        loop {
            match self.store.save_node(snapshot) {
                Ok(()) => {
                    if attempt > 0 {
                        debug!("Saved {} after {} retries", id, attempt);
                    }
                    self.pending.lock().remove(id);
                    return Ok(());
                }
                Err(e) if attempt < self.config.save_retries => {
                    attempt += 1;
                    warn!("Save of {} failed (attempt {}): {}", id, attempt, e);
                }
                Err(e) => {
                    self.pending.lock().insert(id.clone());
                    error!(
                        "Giving up on saving {} after {} attempts, queued for flush: {}",
                        id,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Nodes whose latest state has not reached the store.
    pub fn pending_saves(&self) -> Vec<NodeId> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Retry every pending save. Returns how many were written.
    pub fn flush_pending(&self) -> Result<usize> {
        let registry = self.registry.read();
        let ids = self.pending_saves();
        if ids.is_empty() {
            return Ok(0);
        }
        info!("Flushing {} pending saves", ids.len());
        self.persist_nodes(&registry.tree, &ids)?;
        Ok(ids.len())
    }
}

/// Outcome of saving several nodes for one mutation.
#[derive(Debug, Default)]
pub(crate) struct SaveReport {
    failed: Vec<NodeId>,
    reason: Option<String>,
}

impl SaveReport {
    pub(crate) fn record(&mut self, id: NodeId, result: Result<()>) {
        if let Err(e) = result {
            self.failed.push(id);
            self.reason = Some(e.to_string());
        }
    }

    /// `Durability` if any save failed.
    pub(crate) fn finish(self) -> Result<()> {
        match self.reason {
            None => Ok(()),
            Some(reason) => Err(Error::Durability {
                nodes: self.failed,
                reason,
            }),
        }
    }
}

fn describe(issue: &RebuildIssue) -> String {
    match issue {
        RebuildIssue::DanglingChild { parent, side, child } => {
            format!("{} {} slot pointed at {}, cleared", parent, side, child)
        }
        RebuildIssue::Unreachable(id) => format!("{} not reachable from a founder, dropped", id),
        RebuildIssue::DanglingSponsor { node, sponsor } => {
            format!("{} sponsor {} missing, cleared", node, sponsor)
        }
        RebuildIssue::DepthCorrected { node, stored, actual } => {
            format!("{} depth {} corrected to {}", node, stored, actual)
        }
    }
}

/// Surviving node whose stored record no longer matches memory.
fn repaired_node(issue: &RebuildIssue) -> Option<NodeId> {
    match issue {
        RebuildIssue::DanglingChild { parent, .. } => Some(parent.clone()),
        RebuildIssue::DanglingSponsor { node, .. } => Some(node.clone()),
        RebuildIssue::DepthCorrected { node, .. } => Some(node.clone()),
        RebuildIssue::Unreachable(_) => None,
    }
}
