//! Symbolic expression core: affine/quadratic algebra, the stable-handle
//! indexer, the tuple-keyed container, and bulk matrix ingestion.
//!
//! This crate has no knowledge of the nonlinear graph subsystem
//! (`algform-graph`); the degree-overflow escalation described in the
//! modeling layer's design ("multiplication that would exceed degree 2
//! transparently escalates to a graph node when a graph context is
//! active") is implemented one layer up, in `algform-graph`, which depends
//! on this crate and can therefore fold its types into graph nodes. Here,
//! degree overflow is always a hard [`error::CoreError::DegreeExceeded`].

pub mod aliases;
pub mod error;
pub mod expr;
pub mod indexer;
pub mod matrix;
pub mod tupledict;

pub use aliases::{make_nd_variable, quicksum, quicksum_by};
pub use error::{CoreError, CoreResult};
pub use expr::{
    ComparisonConstraint, Domain, ExprBuilder, ScalarAffineFunction, ScalarQuadraticFunction,
    Sense, VarIdx,
};
pub use indexer::Indexer;
pub use matrix::Rhs;
pub use tupledict::{make_tupledict, Coord, Key, TupleDict};
