//! Crate-wide error type.

use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    /// The evaluation order referenced a node that no longer exists in the
    /// graph or the state store. Recovered by one rebuild and retry.
    #[error("node {0:?} vanished during evaluation")]
    MissingNode(NodeId),

    /// A tick failed again after the rebuild-and-retry.
    #[error("graph structure changed under evaluation (node {node:?}, {attempts} attempts)")]
    StructuralInconsistency { node: NodeId, attempts: usize },

    /// The reachable subgraph contains a cycle, so no total order exists.
    #[error("cycle detected involving {} nodes", nodes.len())]
    CyclicGraph { nodes: Vec<NodeId> },

    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    #[error("node {node:?} has no {direction} socket named '{socket}'")]
    UnknownSocket {
        node: NodeId,
        socket: String,
        direction: &'static str,
    },

    #[error("node {0:?} already has a state entry")]
    DuplicateNode(NodeId),

    #[error("sample block has {rows} rows but {voices} voice ids")]
    BlockShape { rows: usize, voices: usize },

    #[error("node {node:?} ({kind}) returned {got} output blocks, expected {expected}")]
    OutputArity {
        node: NodeId,
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
