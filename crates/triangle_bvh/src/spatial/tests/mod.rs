//! Randomized tests over whole trees
//!
//! Each test builds an index from seeded random geometry and checks it
//! against a brute-force reference.

mod ray_queries;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::foundation::math::Vec3;
use crate::geometry::{Aabb, Ray};
use crate::spatial::{RayHit, TriangleBvh};

pub(super) fn region() -> Aabb {
    Aabb::new(Vec3::new(-4.0, -4.0, -4.0), Vec3::new(4.0, 4.0, 4.0))
}

pub(super) fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

fn point_in(rng: &mut StdRng, bounds: &Aabb) -> Vec3 {
    Vec3::new(
        rng.gen_range(bounds.min.x..bounds.max.x),
        rng.gen_range(bounds.min.y..bounds.max.y),
        rng.gen_range(bounds.min.z..bounds.max.z),
    )
}

/// Index of `count` random triangles of mixed sizes, all inside [`region`]
pub(super) fn random_index(rng: &mut StdRng, count: usize) -> TriangleBvh<u32> {
    let bounds = region();
    let mut index = TriangleBvh::new(bounds, count).unwrap();

    for payload in 0..count as u32 {
        let a = point_in(rng, &bounds);
        let reach = if payload % 5 == 0 { 3.0 } else { 0.4 };
        let near = |rng: &mut StdRng| {
            let offset = Vec3::new(
                rng.gen_range(-reach..reach),
                rng.gen_range(-reach..reach),
                rng.gen_range(-reach..reach),
            );
            (a + offset).sup(&bounds.min).inf(&bounds.max)
        };
        let b = near(rng);
        let c = near(rng);
        index.insert(a, b, c, payload, None).unwrap();
    }

    index
}

/// Ray from a random point just outside or inside the region in a random direction
pub(super) fn random_ray(rng: &mut StdRng) -> Ray {
    let launch = Aabb::from_center_extents(Vec3::zeros(), Vec3::new(6.0, 6.0, 6.0));
    let origin = point_in(rng, &launch);
    let target = point_in(rng, &region());
    Ray::between(origin, target)
}

/// Closest hit by testing every stored triangle
pub(super) fn brute_force(index: &TriangleBvh<u32>, ray: &Ray) -> Option<RayHit> {
    index
        .iter()
        .filter_map(|(id, triangle, _)| {
            triangle.intersect_ray(ray).map(|distance| RayHit {
                triangle_id: id,
                distance,
            })
        })
        .min_by(|l, r| l.distance.total_cmp(&r.distance))
}
