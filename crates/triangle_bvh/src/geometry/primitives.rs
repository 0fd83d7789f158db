//! Primitive shapes and intersection algorithms
//!
//! Provides rays and triangles with the intersection tests the octree
//! needs: ray/triangle distance and triangle/box overlap.

use super::aabb::Aabb;
use crate::foundation::math::{self, Vec3};

/// A ray for ray casting and picking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// The origin point of the ray in world space
    pub origin: Vec3,
    /// The direction of the ray (normalized by [`Ray::new`])
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    ///
    /// The direction is normalized, so hit distances are world-space lengths.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(f32::EPSILON).unwrap_or(direction),
        }
    }

    /// Ray from `from` through `to`
    pub fn between(from: Vec3, to: Vec3) -> Self {
        Self::new(from, to - from)
    }

    /// Get a point along the ray at distance t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// 3-bit mask with bit `i` set when the direction is negative on axis `i`
    ///
    /// XOR-ing an octant index with this mask visits octants in the order the
    /// ray reaches them.
    pub fn approach_mask(&self) -> usize {
        usize::from(self.direction.x < 0.0)
            | usize::from(self.direction.y < 0.0) << 1
            | usize::from(self.direction.z < 0.0) << 2
    }
}

/// A triangle with a cached unit normal
///
/// Immutable once built. The normal follows the right-hand rule over
/// `a`, `b`, `c`; a degenerate triangle has a zero normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    a: Vec3,
    b: Vec3,
    c: Vec3,
    normal: Vec3,
}

impl Triangle {
    /// Creates a new triangle with the winding given
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        let normal = (b - a)
            .cross(&(c - a))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        Self { a, b, c, normal }
    }

    /// Creates a triangle whose normal points to the same side as `desired_normal`
    ///
    /// When the computed normal disagrees (negative dot product) the winding
    /// is flipped by swapping `b` and `c`.
    pub fn oriented(a: Vec3, b: Vec3, c: Vec3, desired_normal: Option<Vec3>) -> Self {
        let triangle = Self::new(a, b, c);
        match desired_normal {
            Some(desired) if triangle.normal.dot(&desired) < 0.0 => Self::new(a, c, b),
            _ => triangle,
        }
    }

    /// First corner
    pub const fn a(&self) -> Vec3 {
        self.a
    }

    /// Second corner
    pub const fn b(&self) -> Vec3 {
        self.b
    }

    /// Third corner
    pub const fn c(&self) -> Vec3 {
        self.c
    }

    /// All three corners in winding order
    pub const fn points(&self) -> [Vec3; 3] {
        [self.a, self.b, self.c]
    }

    /// Unit normal, zero for degenerate triangles
    pub const fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Tight bounding box of the three corners
    pub fn bounds(&self) -> Aabb {
        Aabb::new(math::min3(&self.a, &self.b, &self.c), math::max3(&self.a, &self.b, &self.c))
    }

    /// Möller-Trumbore ray-triangle intersection algorithm
    /// Returns (t, u, v) barycentric coordinates if hit, None otherwise
    ///
    /// Both faces are hit. See: "Fast, Minimum Storage Ray/Triangle
    /// Intersection" by Möller & Trumbore
    pub fn intersect_ray_barycentric(&self, ray: &Ray) -> Option<(f32, f32, f32)> {
        const EPSILON: f32 = 0.000_001;

        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;

        let h = ray.direction.cross(&edge2);
        let det = edge1.dot(&h);

        // Ray parallel to triangle?
        if det.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / det;
        let s = ray.origin - self.a;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * ray.direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        if t >= 0.0 {
            Some((t, u, v))
        } else {
            None // Behind ray origin
        }
    }

    /// Distance along the ray to the hit point, if the ray hits
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        self.intersect_ray_barycentric(ray).map(|(t, _, _)| t)
    }

    /// Separating-axis overlap test against a box (touching counts)
    ///
    /// Tests the 3 box axes, the triangle normal and the 9 edge/axis cross
    /// products. Projections are padded by a small relative tolerance, so a
    /// triangle lying on a cell face is reported in both neighbouring cells.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let half = aabb.extents();
        let v = [self.a - center, self.b - center, self.c - center];
        let scale = half.amax().max(v[0].amax()).max(v[1].amax()).max(v[2].amax());
        let tolerance = scale * 1.0e-5 + f32::MIN_POSITIVE;

        let separated = |axis: Vec3| {
            let p0 = v[0].dot(&axis);
            let p1 = v[1].dot(&axis);
            let p2 = v[2].dot(&axis);
            let r = half.x * axis.x.abs() + half.y * axis.y.abs() + half.z * axis.z.abs();
            let slack = tolerance * (axis.x.abs() + axis.y.abs() + axis.z.abs());
            p0.min(p1).min(p2) > r + slack || p0.max(p1).max(p2) < -(r + slack)
        };

        let box_axes = [Vec3::x(), Vec3::y(), Vec3::z()];
        if box_axes.iter().any(|axis| separated(*axis)) {
            return false;
        }

        let edges = [v[1] - v[0], v[2] - v[1], v[0] - v[2]];
        let face = edges[0].cross(&edges[1]);
        if face.norm_squared() > 0.0 && separated(face) {
            return false;
        }

        for edge in &edges {
            for axis in &box_axes {
                let cross = edge.cross(axis);
                if cross.norm_squared() > 0.0 && separated(cross) {
                    return false;
                }
            }
        }

        true
    }
}
