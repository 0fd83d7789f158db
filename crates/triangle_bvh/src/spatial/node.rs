//! Octree nodes
//!
//! Nodes live in one flat array and refer to each other by index. Node 0 is
//! always the root.

use crate::geometry::Aabb;

/// Index of a node in the node array
pub type NodeId = u32;

/// Index of a triangle entry in the entry array
pub type TriangleId = u32;

/// The root node's index
pub const ROOT: NodeId = 0;

/// Maximum triangle ids a leaf holds before it splits
pub const LEAF_CAPACITY: usize = 8;

/// What a node holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Triangle ids whose triangles overlap the cell
    Leaf(Vec<TriangleId>),
    /// The 8 octant children, indexed by octant bits (x = 1, y = 2, z = 4)
    Internal([NodeId; 8]),
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    cell: Aabb,
    kind: NodeKind,
}

impl Node {
    /// Create an empty leaf
    pub(crate) fn empty_leaf(cell: Aabb) -> Self {
        Self::leaf(cell, Vec::with_capacity(LEAF_CAPACITY))
    }

    pub(crate) fn leaf(cell: Aabb, triangles: Vec<TriangleId>) -> Self {
        Self {
            cell,
            kind: NodeKind::Leaf(triangles),
        }
    }

    pub(crate) fn internal(cell: Aabb, children: [NodeId; 8]) -> Self {
        Self {
            cell,
            kind: NodeKind::Internal(children),
        }
    }

    /// World-space cell of this node
    pub const fn cell(&self) -> &Aabb {
        &self.cell
    }

    /// Leaf or internal payload of this node
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub(crate) fn set_cell(&mut self, cell: Aabb) {
        self.cell = cell;
    }

    /// Check if this node is a leaf
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Triangle ids of a leaf; empty for internal nodes
    pub fn triangle_ids(&self) -> &[TriangleId] {
        match &self.kind {
            NodeKind::Leaf(ids) => ids,
            NodeKind::Internal(_) => &[],
        }
    }

    /// Children of an internal node
    pub const fn children(&self) -> Option<&[NodeId; 8]> {
        match &self.kind {
            NodeKind::Internal(children) => Some(children),
            NodeKind::Leaf(_) => None,
        }
    }
}
