//! Binary serialization for triangle indices
//!
//! Little-endian layout, no version field:
//!
//! ```text
//! f32[3] root_min, f32[3] root_max, i32 node_count, i32 triangle_count,
//! node_count x Node:      i8 count, then count x i32 triangle ids (leaf)
//!                         or, when count == -1, 8 x i32 child ids (internal)
//! triangle_count x Entry: f32[3] a, f32[3] b, f32[3] c, payload bytes
//! ```
//!
//! Only the root cell is stored. Every other cell is derived on load from
//! the root and the tree topology, so it matches the writer's bit for bit.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use serde::{de::DeserializeOwned, Serialize};

use super::error::{CodecError, IndexError};
use super::node::{Node, NodeId, NodeKind, TriangleId, ROOT};
use super::triangle_bvh::{Entry, TriangleBvh};
use crate::core::config::IndexConfig;
use crate::foundation::math::{self, Vec3};
use crate::geometry::{Aabb, Triangle};

/// Count byte marking an internal node
const INTERNAL_MARKER: i8 = -1;

/// Upper bound on up-front allocation driven by header counts
const PREALLOCATION_LIMIT: usize = 1 << 16;

/// Strategy for writing and reading one payload value
pub trait PayloadCodec<P> {
    /// Write `payload` to the stream
    fn encode(&self, payload: &P, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Read one payload from the stream
    fn decode(&self, reader: &mut dyn Read) -> std::io::Result<P>;
}

/// Fixed-width little-endian encoding
pub trait LeBytes: Sized {
    /// Write the little-endian bytes
    fn write_le(&self, writer: &mut dyn Write) -> std::io::Result<()>;

    /// Read the little-endian bytes
    fn read_le(reader: &mut dyn Read) -> std::io::Result<Self>;
}

macro_rules! impl_le_bytes {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LeBytes for $ty {
                fn write_le(&self, writer: &mut dyn Write) -> std::io::Result<()> {
                    writer.write_all(&self.to_le_bytes())
                }

                fn read_le(reader: &mut dyn Read) -> std::io::Result<Self> {
                    let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                    reader.read_exact(&mut bytes)?;
                    Ok(<$ty>::from_le_bytes(bytes))
                }
            }
        )*
    };
}

impl_le_bytes!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Codec for payload-free indices; writes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCodec;

impl PayloadCodec<()> for UnitCodec {
    fn encode(&self, _payload: &(), _writer: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    fn decode(&self, _reader: &mut dyn Read) -> std::io::Result<()> {
        Ok(())
    }
}

/// Codec for fixed-width numbers stored little-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct LeCodec;

impl<P: LeBytes> PayloadCodec<P> for LeCodec {
    fn encode(&self, payload: &P, writer: &mut dyn Write) -> std::io::Result<()> {
        payload.write_le(writer)
    }

    fn decode(&self, reader: &mut dyn Read) -> std::io::Result<P> {
        P::read_le(reader)
    }
}

/// Codec for any serde payload: `u32` byte length followed by RON text
#[derive(Debug, Clone, Copy, Default)]
pub struct RonCodec;

impl<P: Serialize + DeserializeOwned> PayloadCodec<P> for RonCodec {
    fn encode(&self, payload: &P, writer: &mut dyn Write) -> std::io::Result<()> {
        let text = ron::to_string(payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let len = u32::try_from(text.len())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "payload text too long"))?;
        len.write_le(writer)?;
        writer.write_all(text.as_bytes())
    }

    fn decode(&self, reader: &mut dyn Read) -> std::io::Result<P> {
        let len = u64::from(u32::read_le(reader)?);
        let mut bytes = Vec::new();
        Read::take(reader, len).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != len {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        ron::from_str(text).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

fn write_vec3(writer: &mut dyn Write, v: &Vec3) -> std::io::Result<()> {
    v.x.write_le(writer)?;
    v.y.write_le(writer)?;
    v.z.write_le(writer)
}

fn read_vec3(reader: &mut dyn Read) -> std::io::Result<Vec3> {
    Ok(Vec3::new(f32::read_le(reader)?, f32::read_le(reader)?, f32::read_le(reader)?))
}

fn id_to_i32(id: u32) -> i32 {
    // Ids are capped at i32::MAX on insertion.
    i32::try_from(id).unwrap_or(i32::MAX)
}

/// Serialize `index` to `writer`, payloads through `codec`
pub fn write<P, W, C>(index: &TriangleBvh<P>, writer: &mut W, codec: &C) -> Result<(), CodecError>
where
    W: Write,
    C: PayloadCodec<P> + ?Sized,
{
    let writer: &mut dyn Write = writer;
    let nodes = index.nodes();
    let region = index.region();

    write_vec3(writer, &region.min)?;
    write_vec3(writer, &region.max)?;

    let node_count = i32::try_from(nodes.len()).map_err(|_| IndexError::IdSpaceExhausted {
        what: "nodes",
        limit: i32::MAX as usize,
    })?;
    let triangle_count = i32::try_from(index.len()).map_err(|_| IndexError::IdSpaceExhausted {
        what: "triangles",
        limit: i32::MAX as usize,
    })?;
    node_count.write_le(writer)?;
    triangle_count.write_le(writer)?;

    for (node_id, node) in nodes.iter().enumerate() {
        match node.kind() {
            NodeKind::Leaf(ids) => {
                let count = i8::try_from(ids.len())
                    .map_err(|_| CodecError::LeafOverflow { node: node_id, count: ids.len() })?;
                count.write_le(writer)?;
                for &id in ids {
                    id_to_i32(id).write_le(writer)?;
                }
            }
            NodeKind::Internal(children) => {
                INTERNAL_MARKER.write_le(writer)?;
                for &child in children {
                    id_to_i32(child).write_le(writer)?;
                }
            }
        }
    }

    for (triangle_id, triangle, payload) in index.iter() {
        for point in &triangle.points() {
            write_vec3(writer, point)?;
        }
        codec
            .encode(payload, writer)
            .map_err(|e| CodecError::payload(triangle_id, e))?;
    }

    writer.flush()?;
    debug!(
        "Wrote triangle index: {} nodes, {} triangles",
        node_count, triangle_count
    );
    Ok(())
}

/// Rebuild an index from `reader`, payloads through `codec`
///
/// Fails without returning a partial index on short input, out-of-range
/// ids, non-finite vertices, or links that do not form one tree rooted at
/// node 0. Reading stops after the last payload and leaves the rest of the
/// stream untouched; [`from_bytes`] rejects leftover bytes.
pub fn read<P, R, C>(reader: &mut R, codec: &C) -> Result<TriangleBvh<P>, CodecError>
where
    R: Read,
    C: PayloadCodec<P> + ?Sized,
{
    let reader: &mut dyn Read = reader;

    let region = Aabb::new(read_vec3(reader)?, read_vec3(reader)?);
    if !math::is_finite(&region.min) || !math::is_finite(&region.max) || !region.is_valid() {
        return Err(CodecError::InvalidRegion {
            min: region.min.into(),
            max: region.max.into(),
        });
    }

    let raw_node_count = i32::read_le(reader)?;
    let node_count = usize::try_from(raw_node_count)
        .ok()
        .filter(|&count| count >= 1)
        .ok_or(CodecError::InvalidCount { what: "node", value: raw_node_count })?;
    let raw_triangle_count = i32::read_le(reader)?;
    let triangle_count = usize::try_from(raw_triangle_count)
        .map_err(|_| CodecError::InvalidCount { what: "triangle", value: raw_triangle_count })?;

    let mut nodes: Vec<Node> = Vec::new();
    nodes
        .try_reserve_exact(node_count.min(PREALLOCATION_LIMIT))
        .map_err(IndexError::from)?;
    let mut claimed: HashSet<usize> = HashSet::new();

    for node_id in 0..node_count {
        let count = i8::read_le(reader)?;
        let node = match count {
            INTERNAL_MARKER => {
                let mut children: [NodeId; 8] = [ROOT; 8];
                for slot in &mut children {
                    let child = i32::read_le(reader)?;
                    let index = usize::try_from(child)
                        .ok()
                        .filter(|&index| index < node_count)
                        .ok_or(CodecError::ChildOutOfRange { node: node_id, child, node_count })?;
                    if index <= node_id {
                        return Err(CodecError::InvalidTopology {
                            node: node_id,
                            reason: "child index does not follow its parent",
                        });
                    }
                    if !claimed.insert(index) {
                        return Err(CodecError::InvalidTopology {
                            node: node_id,
                            reason: "child already claimed by another parent",
                        });
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let child_id = index as NodeId;
                    *slot = child_id;
                }
                Node::internal(region, children)
            }
            count if count >= 0 => {
                let mut ids: Vec<TriangleId> = Vec::with_capacity(count.unsigned_abs().into());
                for _ in 0..count {
                    let triangle = i32::read_le(reader)?;
                    let id = usize::try_from(triangle)
                        .ok()
                        .filter(|&id| id < triangle_count)
                        .ok_or(CodecError::TriangleOutOfRange {
                            node: node_id,
                            triangle,
                            triangle_count,
                        })?;
                    #[allow(clippy::cast_possible_truncation)]
                    let id = id as TriangleId;
                    ids.push(id);
                }
                Node::leaf(region, ids)
            }
            count => return Err(CodecError::InvalidNodeKind { node: node_id, count }),
        };
        nodes.try_reserve(1).map_err(IndexError::from)?;
        nodes.push(node);
    }

    if let Some(orphan) = (1..node_count).find(|id| !claimed.contains(id)) {
        return Err(CodecError::InvalidTopology {
            node: orphan,
            reason: "node is not reachable from the root",
        });
    }

    let mut entries: Vec<Entry<P>> = Vec::new();
    entries
        .try_reserve_exact(triangle_count.min(PREALLOCATION_LIMIT))
        .map_err(IndexError::from)?;
    for triangle_id in 0..triangle_count {
        let a = read_vec3(reader)?;
        let b = read_vec3(reader)?;
        let c = read_vec3(reader)?;
        if ![a, b, c].iter().all(math::is_finite) {
            return Err(CodecError::NonFiniteTriangle { triangle: triangle_id });
        }
        let payload = codec
            .decode(reader)
            .map_err(|e| CodecError::payload(triangle_id, e))?;
        entries.try_reserve(1).map_err(IndexError::from)?;
        entries.push(Entry {
            triangle: Triangle::new(a, b, c),
            payload,
        });
    }

    derive_cells(&mut nodes);

    debug!(
        "Read triangle index: {} nodes, {} triangles",
        node_count, triangle_count
    );
    Ok(TriangleBvh::from_parts(nodes, entries, IndexConfig::default().max_depth))
}

/// Recompute every cell below the root from the root cell
///
/// Children always follow their parent in the array, so one forward pass
/// sees each parent's final cell before its children.
fn derive_cells(nodes: &mut [Node]) {
    for node_id in 0..nodes.len() {
        if let NodeKind::Internal(children) = *nodes[node_id].kind() {
            let cell = *nodes[node_id].cell();
            for (octant, &child) in children.iter().enumerate() {
                nodes[child as usize].set_cell(cell.child_cell(octant));
            }
        }
    }
}

/// Serialize into a fresh byte vector
pub fn to_bytes<P, C>(index: &TriangleBvh<P>, codec: &C) -> Result<Vec<u8>, CodecError>
where
    C: PayloadCodec<P> + ?Sized,
{
    let mut bytes = Vec::new();
    write(index, &mut bytes, codec)?;
    Ok(bytes)
}

/// Rebuild an index from a byte slice holding exactly one index
pub fn from_bytes<P, C>(mut bytes: &[u8], codec: &C) -> Result<TriangleBvh<P>, CodecError>
where
    C: PayloadCodec<P> + ?Sized,
{
    let index = read(&mut bytes, codec)?;
    if !bytes.is_empty() {
        return Err(CodecError::TrailingBytes { count: bytes.len() });
    }
    Ok(index)
}

/// Write an index to a file
pub fn save_to_file<P, C>(index: &TriangleBvh<P>, path: impl AsRef<Path>, codec: &C) -> Result<(), CodecError>
where
    C: PayloadCodec<P> + ?Sized,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(index, &mut writer, codec)
}

/// Read an index from a file
pub fn load_from_file<P, C>(path: impl AsRef<Path>, codec: &C) -> Result<TriangleBvh<P>, CodecError>
where
    C: PayloadCodec<P> + ?Sized,
{
    let mut reader = BufReader::new(File::open(path)?);
    read(&mut reader, codec)
}
