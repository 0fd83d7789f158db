//! Error types for index construction, insertion and serialization

use std::collections::TryReserveError;
use std::io;

use crate::config::ConfigError;

/// Errors raised while building or growing an index
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The root region is inverted or not finite
    #[error("Degenerate region: {0}")]
    DegenerateRegion(String),

    /// Growing a backing array failed; entries below the old capacity are intact
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(#[from] TryReserveError),

    /// Ids must fit the signed 32-bit fields of the binary format
    #[error("Id space exhausted: more than {limit} {what}")]
    IdSpaceExhausted {
        /// Which array ran out of ids
        what: &'static str,
        /// Largest id count supported
        limit: usize,
    },

    /// A vertex or the desired normal has a NaN or infinite component
    #[error("Non-finite triangle: {0}")]
    NonFiniteTriangle(String),

    /// Construction parameters rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by the binary writer and reader
///
/// The reader never hands back a partially built index.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// IO error other than a short read
    #[error("IO error: {0}")]
    Io(io::Error),

    /// The stream ended before the declared content
    #[error("Stream ended before the declared content")]
    Truncated,

    /// A header count is negative or otherwise unusable
    #[error("Invalid {what} count: {value}")]
    InvalidCount {
        /// Which count
        what: &'static str,
        /// Value read from the stream
        value: i32,
    },

    /// The stored root cell is inverted or not finite
    #[error("Invalid root cell: min {min:?}, max {max:?}")]
    InvalidRegion {
        /// Stored minimum corner
        min: [f32; 3],
        /// Stored maximum corner
        max: [f32; 3],
    },

    /// A node count byte below -1
    #[error("Node {node}: invalid kind byte {count}")]
    InvalidNodeKind {
        /// Offending node
        node: usize,
        /// Byte read
        count: i8,
    },

    /// A child index outside the node array
    #[error("Node {node}: child index {child} out of range (node count {node_count})")]
    ChildOutOfRange {
        /// Offending node
        node: usize,
        /// Child index read
        child: i32,
        /// Declared node count
        node_count: usize,
    },

    /// A triangle index outside the entry array
    #[error("Node {node}: triangle index {triangle} out of range (triangle count {triangle_count})")]
    TriangleOutOfRange {
        /// Offending node
        node: usize,
        /// Triangle index read
        triangle: i32,
        /// Declared triangle count
        triangle_count: usize,
    },

    /// The node links do not form a single tree rooted at node 0
    #[error("Node {node}: invalid topology, {reason}")]
    InvalidTopology {
        /// Offending node
        node: usize,
        /// What is wrong
        reason: &'static str,
    },

    /// A leaf holds more ids than the signed count byte can describe
    #[error("Node {node}: leaf holds {count} triangles, the format allows {}", i8::MAX)]
    LeafOverflow {
        /// Offending node
        node: usize,
        /// Number of ids in the leaf
        count: usize,
    },

    /// A stored vertex has a NaN or infinite component
    #[error("Triangle {triangle}: non-finite vertex")]
    NonFiniteTriangle {
        /// Offending triangle
        triangle: usize,
    },

    /// Bytes remain after the last payload of a complete buffer
    #[error("{count} trailing bytes after the last triangle")]
    TrailingBytes {
        /// Bytes left unread
        count: usize,
    },

    /// The payload codec failed
    #[error("Triangle {triangle}: payload error: {source}")]
    Payload {
        /// Triangle whose payload failed
        triangle: usize,
        /// Codec failure
        #[source]
        source: io::Error,
    },

    /// Allocating the decoded arrays failed
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(err)
        }
    }
}

impl CodecError {
    /// Wrap a payload codec failure, keeping short reads distinguishable
    pub(crate) fn payload(triangle: usize, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Payload { triangle, source: err }
        }
    }
}
