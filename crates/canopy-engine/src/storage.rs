//! Persistent storage for node records.
//!
//! The engine only needs two calls, so storage sits behind [`NodeStore`]:
//! [`RocksStore`] for the node binary and [`MemoryStore`] for tests and
//! throwaway runs.

use crate::error::Result;
use crate::snapshot::NodeSnapshot;
use canopy_topology::NodeId;
use parking_lot::RwLock;
use rocksdb::{Options, DB};
use std::collections::BTreeMap;
use std::path::Path;

/// Key prefix for node records.
const NODE_PREFIX: &[u8] = b"node:";

/// Where node records live between runs.
pub trait NodeStore: Send + Sync {
    /// Every stored record, in no particular order.
    fn load_all_nodes(&self) -> Result<Vec<NodeSnapshot>>;

    /// Insert or replace one record.
    fn save_node(&self, node: &NodeSnapshot) -> Result<()>;
}

/// RocksDB-backed store. Records are JSON under `node:<id>`.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Get one record by id.
    pub fn get_node(&self, id: &NodeId) -> Result<Option<NodeSnapshot>> {
        let key = format!("node:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}

impl NodeStore for RocksStore {
    fn load_all_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        let mut nodes = Vec::new();

        let iter = self.db.prefix_iterator(NODE_PREFIX);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(NODE_PREFIX) {
                let node: NodeSnapshot = serde_json::from_slice(&value)?;
                nodes.push(node);
            } else {
                break;
            }
        }

        Ok(nodes)
    }

    fn save_node(&self, node: &NodeSnapshot) -> Result<()> {
        let key = format!("node:{}", node.id());
        let value = serde_json::to_vec(node)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<NodeId, NodeSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records.
    pub fn with_nodes(nodes: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        let store = Self::new();
        {
            let mut map = store.nodes.write();
            for node in nodes {
                map.insert(node.id().clone(), node);
            }
        }
        store
    }

    pub fn get_node(&self, id: &NodeId) -> Option<NodeSnapshot> {
        self.nodes.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl NodeStore for MemoryStore {
    fn load_all_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        Ok(self.nodes.read().values().cloned().collect())
    }

    fn save_node(&self, node: &NodeSnapshot) -> Result<()> {
        self.nodes.write().insert(node.id().clone(), node.clone());
        Ok(())
    }
}
