//! Placement engine.
//!
//! Every entry point takes the structure write lock, searches, claims the slot
//! and persists before releasing it. All checks run before the first
//! mutation, so a rejected registration leaves nothing behind.

use crate::error::{Error, Result};
use crate::network::Network;
use crate::snapshot::NodeSnapshot;
use canopy_topology::{find_slot, BrandOwnerSlot, Node, NodeId, Role, Scope, Side};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Where a registration landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub id: NodeId,
    pub role: Role,
    pub parent: NodeId,
    pub side: Side,
    pub depth: u32,
    pub sponsor: NodeId,
    /// Customer pushed down under a new brand owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub displaced: Option<NodeId>,
}

impl Network {
    /// Register a node of any role.
    ///
    /// Founders take no sponsor; brand owners are always sponsored by the
    /// parent the search finds.
    pub fn create(
        &self,
        role: Role,
        name: &str,
        contact: &str,
        sponsor: Option<&NodeId>,
    ) -> Result<NodeSnapshot> {
        let id = match (role, sponsor) {
            (Role::Founder, None) => return self.attach_founder(name, contact),
            (Role::Customer, sponsor) => self.register_customer(name, contact, sponsor)?.id,
            (Role::BrandOwner, None) => self.register_brand_owner(name, contact)?.id,
            (role, Some(_)) => {
                return Err(Error::InvalidInput(format!("a {} cannot name a sponsor", role)))
            }
        };
        self.by_id(&id)
    }

    /// Seed a founder root. Bootstrap only: no search and no parent.
    pub fn attach_founder(&self, name: &str, contact: &str) -> Result<NodeSnapshot> {
        let mut registry = self.registry.write();
        let (name, contact) = registry.check_new(name, contact)?;

        let id = registry.next_id(Role::Founder)?;
        registry.tree.insert_root(Node::new(id.clone(), name, contact.clone()))?;
        registry.restructured();
        registry.commit(&id, &contact);
        self.open_account(&id);
        info!("Attached founder {}", id);

        self.persist_nodes(&registry.tree, [&id])?;
        self.snapshot_in(&registry.tree, &id)
    }

    /// Place a customer at the first open slot, searching the whole network or
    /// only the sponsor's subtree.
    ///
    /// Without a sponsor, the structural parent becomes the sponsor.
    pub fn register_customer(
        &self,
        name: &str,
        contact: &str,
        sponsor: Option<&NodeId>,
    ) -> Result<Placement> {
        let mut registry = self.registry.write();
        let (name, contact) = registry.check_new(name, contact)?;

        if let Some(sponsor) = sponsor.filter(|s| !registry.tree.contains(s)) {
            warn!("Registration rejected: sponsor {} does not exist", sponsor);
            return Err(Error::InvalidSponsor(sponsor.to_string()));
        }
        let slot = registry.open_slot(sponsor).ok_or_else(|| {
            warn!("Registration rejected: no open slot for a customer");
            Error::NoEligibleSlot(Role::Customer)
        })?;
        debug!(
            "Customer slot: {} {} (level {})",
            slot.parent, slot.side, slot.level
        );

        let id = registry.next_id(Role::Customer)?;
        registry
            .tree
            .attach(&slot.parent, slot.side, Node::new(id.clone(), name, contact.clone()))?;
        let sponsor = sponsor.cloned().unwrap_or_else(|| slot.parent.clone());
        registry.tree.record_referral(&sponsor, &id)?;
        registry.commit(&id, &contact);
        self.open_account(&id);

        let placement = Placement {
            depth: registry.tree.get(&id).map_or(0, |n| n.depth),
            id,
            role: Role::Customer,
            parent: slot.parent,
            side: slot.side,
            sponsor,
            displaced: None,
        };
        info!(
            "Registered customer {} under {} ({}), sponsor {}",
            placement.id, placement.parent, placement.side, placement.sponsor
        );

        self.persist_nodes(
            &registry.tree,
            [&placement.id, &placement.parent, &placement.sponsor],
        )?;
        Ok(placement)
    }

    /// Place a brand owner under the first founder or brand owner with a slot
    /// that is empty or held by a customer.
    ///
    /// A customer in the claimed slot moves, with its whole subtree, to the
    /// brand owner's left slot.
    pub fn register_brand_owner(&self, name: &str, contact: &str) -> Result<Placement> {
        let mut registry = self.registry.write();
        let (name, contact) = registry.check_new(name, contact)?;

        let slot = find_slot(&registry.tree, Scope::Everywhere, &BrandOwnerSlot).ok_or_else(|| {
            warn!("Registration rejected: no founder or brand-owner slot available");
            Error::NoEligibleSlot(Role::BrandOwner)
        })?;
        debug!(
            "Brand-owner slot: {} {} (level {}, occupant {:?})",
            slot.parent, slot.side, slot.level, slot.occupant
        );

        let id = registry.next_id(Role::BrandOwner)?;
        registry.restructured();
        let node = Node::new(id.clone(), name, contact.clone());
        // The rebase walks through the new node, so its account must exist
        self.open_account(&id);
        let attached = match &slot.occupant {
            None => registry
                .tree
                .attach(&slot.parent, slot.side, node)
                .map(|()| (None, BTreeSet::new()))
                .map_err(Error::from),
            Some(occupant) => self.rebase_subtree(&mut registry.tree, occupant, |tree| {
                Ok(tree.displace(&slot.parent, slot.side, node, Side::Left)?)
            }),
        };
        let (displaced, mut touched) = match attached {
            Ok(attached) => attached,
            Err(e) => {
                self.discard_account(&id);
                return Err(e);
            }
        };
        registry.tree.record_referral(&slot.parent, &id)?;
        registry.commit(&id, &contact);

        let placement = Placement {
            depth: registry.tree.get(&id).map_or(0, |n| n.depth),
            id,
            role: Role::BrandOwner,
            sponsor: slot.parent.clone(),
            parent: slot.parent,
            side: slot.side,
            displaced,
        };
        match &placement.displaced {
            Some(moved) => info!(
                "Registered brand owner {} under {} ({}), displacing {}",
                placement.id, placement.parent, placement.side, moved
            ),
            None => info!(
                "Registered brand owner {} under {} ({})",
                placement.id, placement.parent, placement.side
            ),
        }

        touched.insert(placement.id.clone());
        touched.insert(placement.parent.clone());
        self.persist_nodes(&registry.tree, &touched)?;
        Ok(placement)
    }
}
