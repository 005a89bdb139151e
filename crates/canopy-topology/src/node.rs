//! Structural node record.

use crate::{NodeId, Role};
use std::fmt;

/// One of the two child slots of a node.
///
/// The left subtree is Franchise A, the right subtree Franchise B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides in preference order.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Franchise letter for this side.
    pub const fn leg(&self) -> char {
        match self {
            Side::Left => 'A',
            Side::Right => 'B',
        }
    }

    /// Parse a leg letter or side name (`a`, `b`, `left`, `right`).
    pub fn from_leg(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "left" => Some(Side::Left),
            "b" | "right" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Identity and position of one participant.
///
/// Financial state is kept elsewhere so that structure and balances can be
/// locked independently.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub contact: String,
    pub role: Role,
    /// Distance from the tree root
    pub depth: u32,
    /// Structural parent (None for founders)
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    /// Node credited with recruiting this one
    pub sponsor: Option<NodeId>,
    /// Nodes this one sponsored, in registration order
    #[cfg_attr(feature = "serde", serde(default))]
    pub direct_referrals: Vec<NodeId>,
}

impl Node {
    /// A fresh, unattached node.
    pub fn new(id: NodeId, name: impl Into<String>, contact: impl Into<String>) -> Self {
        let role = id.role();
        Self {
            id,
            name: name.into(),
            contact: contact.into(),
            role,
            depth: 0,
            parent: None,
            left: None,
            right: None,
            sponsor: None,
            direct_referrals: Vec::new(),
        }
    }

    /// Occupant of a child slot.
    pub fn child(&self, side: Side) -> Option<&NodeId> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    pub(crate) fn child_mut(&mut self, side: Side) -> &mut Option<NodeId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Which slot holds `child`, if any.
    pub fn side_of(&self, child: &NodeId) -> Option<Side> {
        Side::BOTH.into_iter().find(|s| self.child(*s) == Some(child))
    }

    /// Children in slot order.
    pub fn children(&self) -> impl Iterator<Item = &NodeId> {
        self.left.iter().chain(self.right.iter())
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// No parent and no children.
    pub fn is_fresh(&self) -> bool {
        self.parent.is_none() && self.left.is_none() && self.right.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_parsing() {
        assert_eq!(Side::from_leg("A"), Some(Side::Left));
        assert_eq!(Side::from_leg("right"), Some(Side::Right));
        assert_eq!(Side::from_leg("c"), None);
        assert_eq!(Side::Right.leg(), 'B');
    }

    #[test]
    fn child_slots() {
        let mut node = Node::new(NodeId::new(Role::Founder, 1), "Root", "root@example.com");
        assert!(node.is_fresh());
        assert_eq!(node.role, Role::Founder);

        let child = NodeId::new(Role::Customer, 1);
        *node.child_mut(Side::Right) = Some(child.clone());
        assert_eq!(node.child(Side::Left), None);
        assert_eq!(node.child(Side::Right), Some(&child));
        assert_eq!(node.side_of(&child), Some(Side::Right));
        assert_eq!(node.children().count(), 1);
    }
}
