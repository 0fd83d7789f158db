//! Axis-aligned bounding boxes
//!
//! Every octree node owns one of these as its cell. Child cells are always
//! derived from the parent with [`Aabb::child_cell`], never stored.

use super::primitives::Ray;
use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing all given points, `None` for an empty slice
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for point in rest {
            bounds.min = bounds.min.inf(point);
            bounds.max = bounds.max.sup(point);
        }
        Some(bounds)
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// True when `min <= max` on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB fully contains another
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Volume of the overlap with another box, zero when they only touch
    pub fn overlap_volume(&self, other: &Self) -> f32 {
        let lo = self.min.sup(&other.min);
        let hi = self.max.inf(&other.max);
        let d = hi - lo;
        if d.x <= 0.0 || d.y <= 0.0 || d.z <= 0.0 {
            0.0
        } else {
            d.x * d.y * d.z
        }
    }

    /// Volume of the box
    pub fn volume(&self) -> f32 {
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Smallest box containing both boxes
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Cell of octant `child` (0..8) when this cell is split at its center
    ///
    /// Bit 0 selects x, bit 1 y, bit 2 z. A set bit picks this cell's max
    /// corner component, a clear bit its min; the child spans from the
    /// center to the picked corner.
    pub fn child_cell(&self, child: usize) -> Self {
        debug_assert!(child < 8, "octant index out of range: {child}");
        let center = self.center();
        let corner = Vec3::new(
            if child & 1 != 0 { self.max.x } else { self.min.x },
            if child & 2 != 0 { self.max.y } else { self.min.y },
            if child & 4 != 0 { self.max.z } else { self.min.z },
        );
        Self::new(center.inf(&corner), center.sup(&corner))
    }

    /// Test ray intersection with this AABB using slab method
    ///
    /// Returns the distance to the entry point if the ray intersects, `0.0`
    /// when the origin is inside the box, `None` otherwise. Faces count as
    /// inside, including for a ray running along one.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let mut tmin = 0.0_f32;
        let mut tmax = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];

            // Parallel to this slab: inside it or never.
            if direction.abs() < f32::MIN_POSITIVE {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let t1 = (self.min[axis] - origin) * inv;
            let t2 = (self.max[axis] - origin) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
            if tmin > tmax {
                return None;
            }
        }

        Some(tmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> Aabb {
        Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_center_and_extents() {
        let aabb = Aabb::new(Vec3::new(-2.0, 0.0, 4.0), Vec3::new(2.0, 2.0, 8.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 1.0, 6.0));
        assert_eq!(aabb.extents(), Vec3::new(2.0, 1.0, 2.0));
        assert_eq!(Aabb::from_center_extents(aabb.center(), aabb.extents()), aabb);
    }

    #[test]
    fn test_child_cells_follow_bit_layout() {
        let cube = unit_cube();
        assert_eq!(cube.child_cell(0), Aabb::new(Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5)));
        assert_eq!(
            cube.child_cell(1),
            Aabb::new(Vec3::new(0.5, 0.0, 0.0), Vec3::new(1.0, 0.5, 0.5))
        );
        assert_eq!(
            cube.child_cell(6),
            Aabb::new(Vec3::new(0.0, 0.5, 0.5), Vec3::new(0.5, 1.0, 1.0))
        );
        assert_eq!(cube.child_cell(7), Aabb::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_children_partition_parent() {
        let parent = Aabb::new(Vec3::new(-3.0, 1.0, -7.5), Vec3::new(5.0, 2.0, 0.5));
        let children: Vec<Aabb> = (0..8).map(|i| parent.child_cell(i)).collect();

        let union = children.iter().skip(1).fold(children[0], |acc, c| acc.union(c));
        assert_eq!(union, parent);

        let total: f32 = children.iter().map(Aabb::volume).sum();
        assert_relative_eq!(total, parent.volume(), epsilon = 1e-4);

        for (i, a) in children.iter().enumerate() {
            assert!(parent.contains(a));
            for b in children.iter().skip(i + 1) {
                assert_eq!(a.overlap_volume(b), 0.0);
            }
        }
    }

    #[test]
    fn test_ray_entry_distance() {
        let cube = unit_cube();
        let ray = Ray::new(Vec3::new(0.5, 0.5, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(cube.intersect_ray(&ray).unwrap(), 1.0);

        let away = Ray::new(Vec3::new(0.5, 0.5, -1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(cube.intersect_ray(&away).is_none());

        let inside = Ray::new(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(cube.intersect_ray(&inside), Some(0.0));
    }

    #[test]
    fn test_ray_parallel_to_slab() {
        let cube = unit_cube();
        let grazing = Ray::new(Vec3::new(-1.0, 2.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert!(cube.intersect_ray(&grazing).is_none());

        let through = Ray::new(Vec3::new(-1.0, 0.25, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(cube.intersect_ray(&through).unwrap(), 1.0);
    }

    #[test]
    fn test_ray_along_shared_face_enters_both_cells() {
        let cube = unit_cube();
        let ray = Ray::new(Vec3::new(0.5, 0.25, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(cube.child_cell(0).intersect_ray(&ray).unwrap(), 1.0);
        assert_relative_eq!(cube.child_cell(1).intersect_ray(&ray).unwrap(), 1.0);
    }

    #[test]
    fn test_from_points() {
        assert!(Aabb::from_points(&[]).is_none());
        let bounds = Aabb::from_points(&[
            Vec3::new(1.0, 5.0, -1.0),
            Vec3::new(-2.0, 0.0, 3.0),
        ])
        .unwrap();
        assert_eq!(bounds, Aabb::new(Vec3::new(-2.0, 0.0, -1.0), Vec3::new(1.0, 5.0, 3.0)));
    }
}
