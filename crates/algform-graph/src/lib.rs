//! Nonlinear expression-graph recording and structural grouping.
//!
//! Built on top of `algform-core`'s affine/quadratic algebra: an
//! [`graph::NLGraph`] is recorded while a [`graph::GraphScope`] is
//! active on the current thread, and [`hash::GraphGrouper`] partitions
//! the resulting instances into structurally-isomorphic groups so each
//! distinct shape is differentiated and compiled exactly once.

pub mod error;
pub mod eval;
pub mod graph;
pub mod hash;

pub use error::{GraphError, GraphResult};
pub use eval::eval_roots;
pub use graph::{
    current_graph, is_graph_active, with_current_graph, BinaryOp, GraphHandle, GraphScope, NLGraph,
    NaryOp, Node, NodeId, TernaryOp, UnaryOp,
};
pub use hash::{structurally_equal, GraphGroup, GraphGrouper, GraphHash};
