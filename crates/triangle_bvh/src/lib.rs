//! # Triangle BVH
//!
//! An octree index over triangle soups, built for picking and line-of-sight
//! queries against static or incrementally growing level geometry.
//!
//! ## Features
//!
//! - **Incremental Insertion**: Triangles are appended one at a time and
//!   leaves split into 8 octants as they fill up
//! - **Ray Casting**: Front-to-back traversal with distance pruning
//! - **Per-Triangle Payloads**: Any payload type, returned by triangle id
//! - **Binary Format**: Compact little-endian serialization with pluggable
//!   payload codecs
//! - **Shared Access**: A reader/writer locked wrapper for worker threads
//!
//! ## Quick Start
//!
//! ```rust
//! use triangle_bvh::prelude::*;
//!
//! let region = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
//! let mut index: TriangleBvh<u32> = TriangleBvh::new(region, 64).unwrap();
//!
//! index.insert(
//!     Vec3::new(0.1, 0.1, 0.5),
//!     Vec3::new(0.9, 0.1, 0.5),
//!     Vec3::new(0.5, 0.9, 0.5),
//!     7,
//!     None,
//! ).unwrap();
//!
//! let ray = Ray::new(Vec3::new(0.5, 0.5, -1.0), Vec3::new(0.0, 0.0, 1.0));
//! let hit = index.ray_cast(&ray).unwrap();
//! assert_eq!(hit.triangle_id, 0);
//! assert_eq!(index.payload(hit.triangle_id), Some(&7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod geometry;
pub mod spatial;

/// Common imports for index users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::IndexConfig,
        foundation::math::Vec3,
        geometry::{Aabb, Ray, Triangle},
        spatial::{
            codec::{LeCodec, PayloadCodec, RonCodec, UnitCodec},
            CodecError, IndexError, Node, NodeKind, RayHit, SharedTriangleBvh, TreeStats,
            TriangleBvh, LEAF_CAPACITY,
        },
    };
}
