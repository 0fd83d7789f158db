//! Spatial indexing
//!
//! The octree over triangles, its binary format and the locked wrapper for
//! sharing one index between threads.

pub mod codec;
mod error;
mod node;
mod shared;
mod triangle_bvh;

#[cfg(test)]
mod tests;

pub use error::{CodecError, IndexError};
pub use node::{Node, NodeId, NodeKind, TriangleId, LEAF_CAPACITY, ROOT};
pub use shared::SharedTriangleBvh;
pub use triangle_bvh::{RayHit, TreeStats, TriangleBvh, MAX_IDS};
