//! Lazy DOM - minimal Document Object Model
//!
//! Arena-based element tree with the pieces lazy image loading needs:
//! parent links for ancestor lookup, simple selector matching and
//! rectangle geometry for visibility checks.

mod geometry;
mod selector;
mod tree;

pub use geometry::DOMRect;
pub use selector::Selector;
pub use tree::{DomTree, ElementData, Node, NodeData};

/// Node identifier (index into arena)
///
/// Identity is the index itself: two ids are the same node exactly when
/// they are equal. Ids are never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Document node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Build an id from a raw arena index.
    pub const fn from_raw(index: u32) -> Self {
        NodeId(index)
    }

    /// Raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check whether this id points at a node
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
