//! `algform`: a unified algebraic modeling layer for mixed-integer,
//! quadratic, conic, and general nonlinear programs.
//!
//! This crate is a thin facade — no logic of its own — re-exporting the
//! public surface of `algform-core` (expression algebra, the stable
//! indexer, tupledicts), `algform-graph` (the nonlinear expression-graph
//! recording context), and `algform-solver` (`NLPModel`, the attribute
//! surface, solver configuration). Most callers only need `use
//! algform::prelude::*;`.

pub use algform_core::{
    make_nd_variable, make_tupledict, quicksum, quicksum_by, ComparisonConstraint, Coord,
    CoreError, CoreResult, Domain, ExprBuilder, Key, Rhs, ScalarAffineFunction,
    ScalarQuadraticFunction, Sense, TupleDict, VarIdx,
};
pub use algform_graph::{
    current_graph, eval_roots, is_graph_active, with_current_graph, BinaryOp, GraphError,
    GraphGroup, GraphGrouper, GraphHandle, GraphHash, GraphResult, GraphScope, NLGraph, NaryOp,
    Node, NodeId, TernaryOp, UnaryOp,
};
pub use algform_solver::{
    adapter, autoload, bridge, AttrValue, ConstraintAttribute, ConstraintHandle, ConstraintKind,
    JitBackend, ModelAttribute, ModelError, ModelResult, NLPModel, ObjectiveSense,
    RawOptionValue, SolutionStatus, SolveOptions, TerminationStatus, VariableAttribute,
};

/// Everything a typical model-building call site needs in scope.
pub mod prelude {
    pub use crate::{
        make_nd_variable, quicksum, ComparisonConstraint, Domain, ExprBuilder, GraphScope,
        NLPModel, ObjectiveSense, Sense, TerminationStatus, VarIdx,
    };
}
