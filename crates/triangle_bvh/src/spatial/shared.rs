//! Reader/writer locked index for use across threads
//!
//! Any number of ray casts run in parallel under the shared lock; an insert
//! takes the exclusive lock, so readers never observe a half-split leaf.

use std::io::{Read, Write};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::codec::{self, PayloadCodec};
use super::error::{CodecError, IndexError};
use super::triangle_bvh::{RayHit, TreeStats, TriangleBvh};
use crate::core::config::IndexConfig;
use crate::foundation::math::Vec3;
use crate::geometry::{Aabb, Ray, Triangle};

/// Thread-safe wrapper around [`TriangleBvh`]
///
/// Accessors return copies or clones taken under the lock, so nothing
/// handed out can be invalidated by a concurrent insert.
#[derive(Debug)]
pub struct SharedTriangleBvh<P> {
    inner: RwLock<TriangleBvh<P>>,
}

impl<P> SharedTriangleBvh<P> {
    /// Create an index covering `region` sized for about `triangle_capacity_hint` triangles
    pub fn new(region: Aabb, triangle_capacity_hint: usize) -> Result<Self, IndexError> {
        TriangleBvh::new(region, triangle_capacity_hint).map(Self::from_index)
    }

    /// Create an index from a configuration
    pub fn with_config(config: &IndexConfig) -> Result<Self, IndexError> {
        TriangleBvh::with_config(config).map(Self::from_index)
    }

    /// Wrap an existing index
    pub fn from_index(index: TriangleBvh<P>) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }

    /// Unwrap the index
    pub fn into_inner(self) -> TriangleBvh<P> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive access without locking
    pub fn get_mut(&mut self) -> &mut TriangleBvh<P> {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared guard for running several queries against one snapshot
    pub fn read(&self) -> RwLockReadGuard<'_, TriangleBvh<P>> {
        // A panicking writer leaves the tree consistent up to the failed split.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TriangleBvh<P>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a triangle under the exclusive lock
    pub fn insert(
        &self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        payload: P,
        desired_normal: Option<Vec3>,
    ) -> Result<usize, IndexError> {
        self.write().insert(a, b, c, payload, desired_normal)
    }

    /// Closest triangle hit by `ray`
    pub fn ray_cast(&self, ray: &Ray) -> Option<RayHit> {
        self.read().ray_cast(ray)
    }

    /// Closest triangle hit by `ray` nearer than `max_distance`
    pub fn ray_cast_within(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        self.read().ray_cast_within(ray, max_distance)
    }

    /// Cast every ray against one consistent snapshot
    pub fn ray_cast_batch(&self, rays: &[Ray]) -> Vec<Option<RayHit>> {
        let index = self.read();
        rays.iter().map(|ray| index.ray_cast(ray)).collect()
    }

    /// Copy of the stored triangle for `id`
    pub fn triangle(&self, id: usize) -> Option<Triangle> {
        self.read().triangle(id).copied()
    }

    /// Run `f` on the payload for `id` under the shared lock
    pub fn with_payload<R>(&self, id: usize, f: impl FnOnce(&P) -> R) -> Option<R> {
        self.read().payload(id).map(f)
    }

    /// Number of stored triangles
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// True when no triangle has been inserted
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Root cell fixed at construction
    pub fn region(&self) -> Aabb {
        *self.read().region()
    }

    /// Shape summary of the tree
    pub fn stats(&self) -> TreeStats {
        self.read().stats()
    }

    /// Serialize under the shared lock
    pub fn write_to<W, C>(&self, writer: &mut W, codec: &C) -> Result<(), CodecError>
    where
        W: Write,
        C: PayloadCodec<P> + ?Sized,
    {
        codec::write(&*self.read(), writer, codec)
    }

    /// Decode a stream into a new shared index
    pub fn read_from<R, C>(reader: &mut R, codec: &C) -> Result<Self, CodecError>
    where
        R: Read,
        C: PayloadCodec<P> + ?Sized,
    {
        codec::read(reader, codec).map(Self::from_index)
    }
}

impl<P: Clone> SharedTriangleBvh<P> {
    /// Clone of the stored payload for `id`
    pub fn payload(&self, id: usize) -> Option<P> {
        self.read().payload(id).cloned()
    }
}

impl<P> From<TriangleBvh<P>> for SharedTriangleBvh<P> {
    fn from(index: TriangleBvh<P>) -> Self {
        Self::from_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::codec::LeCodec;

    fn unit_cube() -> Aabb {
        Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
    }

    fn tile(index: &SharedTriangleBvh<u32>, x: f32, y: f32, z: f32, payload: u32) -> usize {
        let r = 0.03;
        index
            .insert(
                Vec3::new(x - r, y - r, z),
                Vec3::new(x + r, y - r, z),
                Vec3::new(x, y + r, z),
                payload,
                None,
            )
            .unwrap()
    }

    fn grid_rays() -> Vec<Ray> {
        let mut rays = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let x = 0.05 + 0.1 * i as f32;
                let y = 0.05 + 0.1 * j as f32;
                rays.push(Ray::new(Vec3::new(x, y, -0.5), Vec3::new(0.0, 0.0, 1.0)));
            }
        }
        rays
    }

    #[test]
    fn test_concurrent_readers_match_sequential() {
        let index = SharedTriangleBvh::new(unit_cube(), 128).unwrap();
        for i in 0..10 {
            for j in 0..10 {
                let x = 0.05 + 0.1 * i as f32;
                let y = 0.05 + 0.1 * j as f32;
                tile(&index, x, y, 0.1 + 0.08 * ((i + j) % 10) as f32, i * 10 + j);
            }
        }

        let rays = grid_rays();
        let expected = index.ray_cast_batch(&rays);
        assert!(expected.iter().all(Option::is_some));

        let (rays, index) = (&rays, &index);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || rays.iter().map(|ray| index.ray_cast(ray)).collect::<Vec<_>>()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_inserts_from_many_threads() {
        let index = SharedTriangleBvh::new(unit_cube(), 64).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4_u32 {
                let index = &index;
                scope.spawn(move || {
                    for k in 0..10_u32 {
                        let x = 0.05 + 0.1 * k as f32;
                        let y = 0.1 + 0.2 * t as f32;
                        tile(index, x, y, 0.5, t * 100 + k);
                    }
                });
            }
        });

        assert_eq!(index.len(), 40);
        let mut payloads: Vec<u32> = (0..40).filter_map(|id| index.payload(id)).collect();
        payloads.sort_unstable();
        let mut expected: Vec<u32> = (0..4).flat_map(|t| (0..10).map(move |k| t * 100 + k)).collect();
        expected.sort_unstable();
        assert_eq!(payloads, expected);

        // Every triangle is reachable by a ray through its centroid.
        for id in 0..40 {
            let centroid = index.triangle(id).unwrap().centroid();
            let ray = Ray::new(centroid - Vec3::new(0.0, 0.0, 0.25), Vec3::new(0.0, 0.0, 1.0));
            assert!(index.ray_cast(&ray).is_some());
        }
    }

    #[test]
    fn test_accessors_copy_out() {
        let index = SharedTriangleBvh::new(unit_cube(), 4).unwrap();
        let id = tile(&index, 0.5, 0.5, 0.5, 42);

        let triangle = index.triangle(id).unwrap();
        tile(&index, 0.2, 0.2, 0.2, 43);
        assert_eq!(index.triangle(id), Some(triangle));
        assert_eq!(index.payload(id), Some(42));
        assert_eq!(index.with_payload(id, |p| p * 2), Some(84));
        assert!(index.payload(5).is_none());
        assert_eq!(index.region(), unit_cube());
    }

    #[test]
    fn test_stream_round_trip() {
        let index = SharedTriangleBvh::new(unit_cube(), 16).unwrap();
        for k in 0..12 {
            tile(&index, 0.05 + 0.075 * k as f32, 0.5, 0.5, k);
        }

        let mut bytes = Vec::new();
        index.write_to(&mut bytes, &LeCodec).unwrap();
        let restored = SharedTriangleBvh::<u32>::read_from(&mut bytes.as_slice(), &LeCodec).unwrap();

        assert_eq!(restored.len(), index.len());
        assert_eq!(restored.stats(), index.stats());
        let rays = grid_rays();
        assert_eq!(restored.ray_cast_batch(&rays), index.ray_cast_batch(&rays));
    }

    #[test]
    fn test_into_inner_and_get_mut() {
        let mut index: SharedTriangleBvh<u32> = TriangleBvh::new(unit_cube(), 4).unwrap().into();
        index
            .get_mut()
            .insert(Vec3::zeros(), Vec3::x(), Vec3::y(), 1, None)
            .unwrap();
        let inner = index.into_inner();
        assert_eq!(inner.len(), 1);
    }
}
