//! Geometry module
//!
//! Bounding boxes, rays and triangles used by the spatial index.

pub mod aabb;
pub mod primitives;

pub use aabb::Aabb;
pub use primitives::{Ray, Triangle};
