//! Octree index over a triangle soup
//!
//! Triangles are appended to a flat entry array and their ids distributed
//! into every leaf whose cell they overlap. A full leaf splits into 8
//! octants at its center. Both insertion and ray casting walk the tree with
//! an explicit stack.

use log::{debug, trace, warn};

use super::error::IndexError;
use super::node::{Node, NodeId, NodeKind, TriangleId, LEAF_CAPACITY, ROOT};
use crate::core::config::IndexConfig;
use crate::foundation::math::{self, Vec3};
use crate::geometry::{Aabb, Ray, Triangle};

/// Largest array length whose ids fit the binary format's `i32` fields
pub const MAX_IDS: usize = i32::MAX as usize;

/// Closest triangle hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Id of the triangle hit
    pub triangle_id: usize,
    /// Distance from the ray origin to the hit point
    pub distance: f32,
}

impl RayHit {
    /// World-space hit point along `ray`
    pub fn point(&self, ray: &Ray) -> Vec3 {
        ray.point_at(self.distance)
    }
}

/// Shape summary of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Total nodes
    pub node_count: usize,
    /// Leaf nodes
    pub leaf_count: usize,
    /// Internal nodes
    pub internal_count: usize,
    /// Deepest leaf (root = 0)
    pub max_depth: u32,
    /// Triangle ids summed over all leaves
    pub triangle_references: usize,
    /// Most ids held by one leaf
    pub largest_leaf: usize,
}

/// A stored triangle and its payload
#[derive(Debug, Clone)]
pub(crate) struct Entry<P> {
    pub(crate) triangle: Triangle,
    pub(crate) payload: P,
}

/// Octree index over triangles carrying a payload of type `P`
///
/// Single-owner: insertion needs `&mut self`, so references handed out by
/// [`TriangleBvh::triangle`] and [`TriangleBvh::payload`] can never outlive
/// a growth of the backing arrays. Use
/// [`SharedTriangleBvh`](super::SharedTriangleBvh) to share one index
/// between threads.
#[derive(Debug, Clone)]
pub struct TriangleBvh<P> {
    nodes: Vec<Node>,
    entries: Vec<Entry<P>>,
    max_depth: u32,
}

impl<P> TriangleBvh<P> {
    /// Create an index covering `region` sized for about `triangle_capacity_hint` triangles
    pub fn new(region: Aabb, triangle_capacity_hint: usize) -> Result<Self, IndexError> {
        Self::with_config(&IndexConfig::new(region, triangle_capacity_hint))
    }

    /// Create an index from a configuration
    pub fn with_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let region = config.region();
        if !math::is_finite(&region.min) || !math::is_finite(&region.max) || !region.is_valid() {
            return Err(IndexError::DegenerateRegion(format!(
                "{:?}..{:?}",
                region.min.as_slice(),
                region.max.as_slice()
            )));
        }
        config.validate()?;

        let hint = config.triangle_capacity_hint.min(MAX_IDS);
        let mut entries = Vec::new();
        entries.try_reserve_exact(hint)?;

        // Roughly one node per half leaf of triangles.
        let mut nodes = Vec::new();
        nodes.try_reserve_exact(hint / 2 + 1)?;
        nodes.push(Node::empty_leaf(region));

        debug!(
            "Created triangle index over {:?}..{:?} (hint {}, max depth {})",
            config.region_min.as_slice(),
            config.region_max.as_slice(),
            hint,
            config.max_depth
        );

        Ok(Self {
            nodes,
            entries,
            max_depth: config.max_depth,
        })
    }

    /// Reassemble an index from decoded parts; cells must already be derived
    pub(crate) const fn from_parts(nodes: Vec<Node>, entries: Vec<Entry<P>>, max_depth: u32) -> Self {
        Self {
            nodes,
            entries,
            max_depth,
        }
    }

    /// Builder-style depth limit for further insertions
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Insert a triangle with its payload and return its id
    ///
    /// When `desired_normal` is given and the triangle's computed normal
    /// points away from it, the winding is flipped. Non-finite input is
    /// rejected before anything is stored. On an allocation error the entry
    /// may already be stored and partially distributed.
    pub fn insert(
        &mut self,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        payload: P,
        desired_normal: Option<Vec3>,
    ) -> Result<usize, IndexError> {
        let corners_finite = [a, b, c].iter().all(math::is_finite);
        if !corners_finite || desired_normal.is_some_and(|normal| !math::is_finite(&normal)) {
            return Err(IndexError::NonFiniteTriangle(format!(
                "{:?}, {:?}, {:?} (desired normal {:?})",
                a.as_slice(),
                b.as_slice(),
                c.as_slice(),
                desired_normal.as_ref().map(|normal| normal.as_slice())
            )));
        }
        let triangle = Triangle::oriented(a, b, c, desired_normal);

        let id = self.entries.len();
        if id >= MAX_IDS {
            return Err(IndexError::IdSpaceExhausted { what: "triangles", limit: MAX_IDS });
        }
        #[allow(clippy::cast_possible_truncation)]
        let triangle_id = id as TriangleId;
        self.entries.try_reserve(1)?;
        self.entries.push(Entry { triangle, payload });

        self.distribute(triangle_id, &triangle)?;
        Ok(id)
    }

    /// Add a triangle id to every leaf its triangle overlaps, splitting full leaves
    fn distribute(&mut self, id: TriangleId, triangle: &Triangle) -> Result<(), IndexError> {
        let max_depth = self.max_depth;
        let mut stack: Vec<(NodeId, u32)> = vec![(ROOT, 0)];

        while let Some((node_id, depth)) = stack.pop() {
            let node = &mut self.nodes[node_id as usize];
            if !triangle.intersects_aabb(node.cell()) {
                continue;
            }

            let children = match node.kind_mut() {
                NodeKind::Internal(children) => *children,
                NodeKind::Leaf(ids) if ids.len() < LEAF_CAPACITY || depth >= max_depth => {
                    if ids.len() == LEAF_CAPACITY {
                        warn!(
                            "Leaf {} at depth limit {} exceeds capacity {}",
                            node_id, max_depth, LEAF_CAPACITY
                        );
                    }
                    ids.push(id);
                    continue;
                }
                NodeKind::Leaf(_) => self.subdivide(node_id)?,
            };

            stack.extend(children.iter().map(|&child| (child, depth + 1)));
        }

        Ok(())
    }

    /// Split a leaf into 8 octant leaves and hand its triangles down
    fn subdivide(&mut self, node_id: NodeId) -> Result<[NodeId; 8], IndexError> {
        let first = self.nodes.len();
        if first + 8 > MAX_IDS {
            return Err(IndexError::IdSpaceExhausted { what: "nodes", limit: MAX_IDS });
        }
        self.nodes.try_reserve(8)?;

        let parent = &mut self.nodes[node_id as usize];
        let cell = *parent.cell();
        let ids = match parent.kind_mut() {
            NodeKind::Leaf(ids) => std::mem::take(ids),
            NodeKind::Internal(children) => return Ok(*children),
        };

        #[allow(clippy::cast_possible_truncation)]
        let children: [NodeId; 8] = std::array::from_fn(|octant| (first + octant) as NodeId);
        *self.nodes[node_id as usize].kind_mut() = NodeKind::Internal(children);

        for octant in 0..8 {
            let child_cell = cell.child_cell(octant);
            let mut child_ids = Vec::with_capacity(LEAF_CAPACITY);
            child_ids.extend(
                ids.iter()
                    .copied()
                    .filter(|&tri| self.entries[tri as usize].triangle.intersects_aabb(&child_cell)),
            );
            self.nodes.push(Node::leaf(child_cell, child_ids));
        }

        trace!("Split node {} into nodes {}..{}", node_id, first, first + 8);
        Ok(children)
    }

    /// Closest triangle hit by `ray`
    pub fn ray_cast(&self, ray: &Ray) -> Option<RayHit> {
        self.ray_cast_within(ray, f32::INFINITY)
    }

    /// Closest triangle hit by `ray` nearer than `max_distance`
    ///
    /// Children are visited nearest octant first so the best distance
    /// tightens early; any cell entered beyond the best distance is pruned.
    pub fn ray_cast_within(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        let mask = ray.approach_mask();
        let mut best_distance = max_distance;
        let mut best_id: Option<TriangleId> = None;

        let mut stack: Vec<NodeId> = Vec::with_capacity(64);
        stack.push(ROOT);

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id as usize];
            match node.cell().intersect_ray(ray) {
                Some(entry) if entry <= best_distance => {}
                _ => continue,
            }

            match node.kind() {
                NodeKind::Leaf(ids) => {
                    for &id in ids {
                        if let Some(t) = self.entries[id as usize].triangle.intersect_ray(ray) {
                            if t < best_distance {
                                best_distance = t;
                                best_id = Some(id);
                            }
                        }
                    }
                }
                NodeKind::Internal(children) => {
                    // Last pushed is popped first: push the far octants first.
                    for octant in (0..8).rev() {
                        stack.push(children[octant ^ mask]);
                    }
                }
            }
        }

        best_id.map(|id| RayHit {
            triangle_id: id as usize,
            distance: best_distance,
        })
    }

    /// Stored triangle for `id`
    pub fn triangle(&self, id: usize) -> Option<&Triangle> {
        self.entries.get(id).map(|entry| &entry.triangle)
    }

    /// Stored payload for `id`
    pub fn payload(&self, id: usize) -> Option<&P> {
        self.entries.get(id).map(|entry| &entry.payload)
    }

    /// Mutable payload for `id`; the triangle itself stays immutable
    pub fn payload_mut(&mut self, id: usize) -> Option<&mut P> {
        self.entries.get_mut(id).map(|entry| &mut entry.payload)
    }

    /// Iterate `(id, triangle, payload)` in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Triangle, &P)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id, &entry.triangle, &entry.payload))
    }

    /// Number of stored triangles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no triangle has been inserted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root cell fixed at construction
    pub fn region(&self) -> &Aabb {
        self.nodes[ROOT as usize].cell()
    }

    /// Depth at which leaves stop splitting
    pub const fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Node by index
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// All nodes in array order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Cells of every leaf that holds at least one triangle
    pub fn leaf_cells(&self) -> Vec<Aabb> {
        self.nodes
            .iter()
            .filter(|node| node.is_leaf() && !node.triangle_ids().is_empty())
            .map(|node| *node.cell())
            .collect()
    }

    /// Walk the tree and summarize its shape
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            node_count: self.nodes.len(),
            ..TreeStats::default()
        };

        let mut stack: Vec<(NodeId, u32)> = vec![(ROOT, 0)];
        while let Some((node_id, depth)) = stack.pop() {
            match self.nodes[node_id as usize].kind() {
                NodeKind::Leaf(ids) => {
                    stats.leaf_count += 1;
                    stats.max_depth = stats.max_depth.max(depth);
                    stats.triangle_references += ids.len();
                    stats.largest_leaf = stats.largest_leaf.max(ids.len());
                }
                NodeKind::Internal(children) => {
                    stats.internal_count += 1;
                    stack.extend(children.iter().map(|&child| (child, depth + 1)));
                }
            }
        }

        stats
    }
}
