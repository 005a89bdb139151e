//! Node registry: the tree plus its contact index and id counters.
//!
//! A [`Registry`] is only ever touched under the network's structure lock, so
//! checking a contact, allocating an id and attaching the node happen as one
//! unit.

use crate::error::{Error, Result};
use crate::network::Network;
use crate::snapshot::{NodeSnapshot, NodeView};
use canopy_topology::{
    find_slot, IdAllocator, NodeId, OpenSlot, OpenSlotCursor, Role, Scope, SlotCandidate, Tree,
};
use std::collections::HashMap;
use tracing::warn;

/// Index key for a contact: trimmed and lowercased.
pub fn contact_key(contact: &str) -> String {
    contact.trim().to_lowercase()
}

/// Structural state guarded by the network's `RwLock`.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) tree: Tree,
    contacts: HashMap<String, NodeId>,
    ids: IdAllocator,
    open_slots: OpenSlotCursor,
}

impl Registry {
    /// Index a rebuilt tree. `seen` are every id ever stored, including
    /// records the rebuild dropped, so their ids are never handed out again.
    pub(crate) fn from_tree<'a>(tree: Tree, seen: impl IntoIterator<Item = &'a NodeId>) -> Self {
        let mut ids = IdAllocator::new();
        for id in seen {
            ids.observe(id);
        }
        let mut contacts = HashMap::new();
        let mut nodes: Vec<_> = tree.nodes().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        for node in nodes {
            ids.observe(&node.id);
            if let Some(existing) = contacts.insert(contact_key(&node.contact), node.id.clone()) {
                warn!(
                    "Contact {:?} stored for both {} and {}; lookups resolve to {}",
                    node.contact, existing, node.id, node.id
                );
            }
        }
        Self {
            tree,
            contacts,
            ids,
            open_slots: OpenSlotCursor::new(),
        }
    }

    /// Validate a new registration's name and contact. Returns them trimmed.
    pub(crate) fn check_new(&self, name: &str, contact: &str) -> Result<(String, String)> {
        let (name, contact) = (name.trim(), contact.trim());
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be empty".into()));
        }
        if contact.is_empty() {
            return Err(Error::InvalidInput("contact must not be empty".into()));
        }
        if self.contacts.contains_key(&contact_key(contact)) {
            warn!("Registration rejected: contact {:?} already registered", contact);
            return Err(Error::DuplicateContact(contact.to_string()));
        }
        Ok((name.to_string(), contact.to_string()))
    }

    /// Id the next registration of `role` will receive.
    pub(crate) fn next_id(&self, role: Role) -> Result<NodeId> {
        Ok(self.ids.peek(role)?)
    }

    /// First open slot for a customer, anywhere or inside `scope`.
    pub(crate) fn open_slot(&mut self, scope: Option<&NodeId>) -> Option<SlotCandidate> {
        match scope {
            Some(root) => find_slot(&self.tree, Scope::Subtree(root), &OpenSlot),
            None => self.open_slots.next_slot(&self.tree),
        }
    }

    /// Call after adding a root or moving a subtree.
    pub(crate) fn restructured(&mut self) {
        self.open_slots.reset();
    }

    /// Record a node that has been attached to the tree.
    pub(crate) fn commit(&mut self, id: &NodeId, contact: &str) {
        self.ids.observe(id);
        self.contacts.insert(contact_key(contact), id.clone());
    }

    pub(crate) fn lookup_contact(&self, contact: &str) -> Option<&NodeId> {
        self.contacts.get(&contact_key(contact))
    }
}

impl Network {
    /// Full record of one node.
    pub fn by_id(&self, id: &NodeId) -> Result<NodeSnapshot> {
        let registry = self.registry.read();
        self.snapshot_in(&registry.tree, id)
    }

    /// Full record of the node registered under `contact` (case-insensitive).
    pub fn by_contact(&self, contact: &str) -> Result<NodeSnapshot> {
        let registry = self.registry.read();
        let id = registry
            .lookup_contact(contact)
            .ok_or_else(|| Error::NotFound(format!("contact {}", contact.trim())))?;
        self.snapshot_in(&registry.tree, id)
    }

    /// Dashboard view of one node.
    pub fn view(&self, id: &NodeId) -> Result<NodeView> {
        let registry = self.registry.read();
        self.view_in(&registry.tree, id)
    }

    /// Founder roots in bootstrap order.
    pub fn founders(&self) -> Result<Vec<NodeView>> {
        let registry = self.registry.read();
        registry
            .tree
            .roots()
            .iter()
            .map(|id| self.view_in(&registry.tree, id))
            .collect()
    }

    /// Nodes `id` sponsored, in registration order.
    pub fn direct_referrals(&self, id: &NodeId) -> Result<Vec<NodeView>> {
        let registry = self.registry.read();
        let node = registry.tree.get(id).ok_or_else(|| Error::unknown(id))?;
        node.direct_referrals
            .iter()
            .map(|referral| self.view_in(&registry.tree, referral))
            .collect()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.registry.read().tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn view_in(&self, tree: &Tree, id: &NodeId) -> Result<NodeView> {
        let node = tree.get(id).ok_or_else(|| Error::unknown(id))?;
        let account = self.account(id)?;
        let account = account.lock();
        Ok(NodeView::new(node, &account))
    }
}
