//! Ray casts on random trees against brute force

use approx::assert_relative_eq;

use super::{brute_force, random_index, random_ray, rng};
use crate::spatial::codec::{self, LeCodec};
use crate::spatial::SharedTriangleBvh;

#[test]
fn test_ray_cast_matches_brute_force() {
    let mut rng = rng(10);
    let index = random_index(&mut rng, 300);

    let mut hits = 0;
    for _ in 0..500 {
        let ray = random_ray(&mut rng);
        match (index.ray_cast(&ray), brute_force(&index, &ray)) {
            (None, None) => {}
            (Some(found), Some(expected)) => {
                hits += 1;
                assert_relative_eq!(found.distance, expected.distance, epsilon = 1e-4);
                let own = index.triangle(found.triangle_id).unwrap().intersect_ray(&ray).unwrap();
                assert_relative_eq!(own, found.distance);
            }
            (found, expected) => panic!("ray {ray:?}: tree {found:?}, brute force {expected:?}"),
        }
    }
    assert!(hits > 100, "only {hits} rays hit");
}

#[test]
fn test_ray_cast_within_never_exceeds_limit() {
    let mut rng = rng(11);
    let index = random_index(&mut rng, 200);

    for _ in 0..300 {
        let ray = random_ray(&mut rng);
        let limit = 5.0;
        let limited = index.ray_cast_within(&ray, limit);
        match index.ray_cast(&ray) {
            Some(hit) if hit.distance < limit => {
                assert_relative_eq!(limited.unwrap().distance, hit.distance);
            }
            _ => assert!(limited.is_none()),
        }
    }
}

#[test]
fn test_restored_tree_answers_identically() {
    let mut rng = rng(12);
    let index = random_index(&mut rng, 250);
    let restored = codec::from_bytes::<u32, _>(&codec::to_bytes(&index, &LeCodec).unwrap(), &LeCodec).unwrap();

    assert_eq!(restored.nodes(), index.nodes());
    for _ in 0..300 {
        let ray = random_ray(&mut rng);
        let expected = index.ray_cast(&ray);
        assert_eq!(restored.ray_cast(&ray), expected);
        if let Some(hit) = expected {
            assert_eq!(restored.payload(hit.triangle_id), index.payload(hit.triangle_id));
        }
    }
}

#[test]
fn test_parallel_readers_on_random_tree() {
    let mut rng = rng(13);
    let shared = SharedTriangleBvh::from_index(random_index(&mut rng, 200));
    let rays: Vec<_> = (0..200).map(|_| random_ray(&mut rng)).collect();
    let expected = shared.ray_cast_batch(&rays);

    let (shared, rays, expected) = (&shared, &rays, &expected);
    std::thread::scope(|scope| {
        for worker in 0..4 {
            scope.spawn(move || {
                // Each worker walks the battery from a different starting point.
                for step in 0..rays.len() {
                    let i = (step + worker * 50) % rays.len();
                    assert_eq!(shared.ray_cast(&rays[i]), expected[i]);
                }
            });
        }
    });
}
