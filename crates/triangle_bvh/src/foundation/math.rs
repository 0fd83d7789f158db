//! Math utilities and types
//!
//! Vector types shared by the geometry and spatial modules.

pub use nalgebra::Vector3;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Component-wise minimum of three points
pub fn min3(a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    a.inf(b).inf(c)
}

/// Component-wise maximum of three points
pub fn max3(a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    a.sup(b).sup(c)
}

/// Returns true when every component is finite
pub fn is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}
