//! Node identifiers and roles.
//!
//! Ids are human readable: a three letter role prefix followed by a zero padded
//! per-role sequence number, e.g. `FND000001`, `CUS000042`, `BRD000007`.

use crate::error::{Result, TopologyError};
use crate::{ID_DIGITS, ID_PREFIX_LEN};
use std::fmt;
use std::str::FromStr;

/// The part a participant plays in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    /// Seed root, created at bootstrap
    Founder,
    /// Regular registrant
    Customer,
    /// Registrant that may displace customer subtrees
    BrandOwner,
}

impl Role {
    /// All roles, in id-allocator order.
    pub const ALL: [Role; 3] = [Role::Founder, Role::Customer, Role::BrandOwner];

    /// Id prefix for this role.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Role::Founder => "FND",
            Role::Customer => "CUS",
            Role::BrandOwner => "BRD",
        }
    }

    /// Look a role up by its id prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.prefix() == prefix)
    }

    /// Whether a brand owner may be placed directly under this role.
    pub const fn hosts_brand_owners(&self) -> bool {
        matches!(self, Role::Founder | Role::BrandOwner)
    }

    const fn index(&self) -> usize {
        match self {
            Role::Founder => 0,
            Role::Customer => 1,
            Role::BrandOwner => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Founder => "founder",
            Role::Customer => "customer",
            Role::BrandOwner => "brand_owner",
        };
        f.write_str(name)
    }
}

/// Stable, human-readable node identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct NodeId(String);

impl NodeId {
    /// Build the id for sequence number `seq` of `role`.
    pub fn new(role: Role, seq: u64) -> Self {
        Self(format!("{}{:0width$}", role.prefix(), seq, width = ID_DIGITS))
    }

    /// Parse and validate an id string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || TopologyError::InvalidId(s.to_string());
        if !s.is_ascii() || s.len() < ID_PREFIX_LEN + 1 {
            return Err(invalid());
        }
        let (prefix, digits) = s.split_at(ID_PREFIX_LEN);
        if Role::from_prefix(prefix).is_none() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<u64>().map_err(|_| invalid())?;
        Ok(Self(s.to_string()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Role encoded in the prefix.
    pub fn role(&self) -> Role {
        // Validated at construction
        Role::from_prefix(&self.0[..ID_PREFIX_LEN]).unwrap_or(Role::Customer)
    }

    /// Numeric sequence part.
    pub fn sequence(&self) -> u64 {
        self.0[ID_PREFIX_LEN..].parse().unwrap_or(0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonic per-role sequence counters.
///
/// Callers allocate inside the same critical section that attaches the node,
/// so two registrations can never observe the same counter value.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: [u64; 3],
}

impl IdAllocator {
    /// Fresh allocator; first id of each role has sequence 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for `role`.
    pub fn allocate(&mut self, role: Role) -> Result<NodeId> {
        let next = self.next_sequence(role)?;
        self.last[role.index()] = next;
        Ok(NodeId::new(role, next))
    }

    /// Record an existing id so later allocations never collide with it.
    pub fn observe(&mut self, id: &NodeId) {
        let last = &mut self.last[id.role().index()];
        *last = (*last).max(id.sequence());
    }

    /// Id the next `allocate(role)` would return.
    pub fn peek(&self, role: Role) -> Result<NodeId> {
        Ok(NodeId::new(role, self.next_sequence(role)?))
    }

    fn next_sequence(&self, role: Role) -> Result<u64> {
        self.last[role.index()]
            .checked_add(1)
            .ok_or(TopologyError::SequenceExhausted(role))
    }
}
