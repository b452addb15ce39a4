//! Errors raised while recording or finalizing an expression graph.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A graph-only constructor was called with no active recording
    /// context on the current thread.
    #[error("no active expression-graph context on this thread")]
    NoActiveGraph,

    /// A graph output referenced a node id that does not belong to the
    /// graph (should be unreachable given the arena's append-only
    /// construction, kept as a defensive check at the finalize boundary).
    #[error("graph output references unknown node {0:?}")]
    DanglingOutput(u32),

    /// `finalize` was called on a graph with no constraint or objective
    /// outputs recorded.
    #[error("graph has no registered outputs")]
    EmptyGraph,
}

pub type GraphResult<T> = Result<T, GraphError>;
