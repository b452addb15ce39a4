//! Top-level error taxonomy every other crate's error converts into.
//!
//! Named variants carrying structured context, `#[from]` conversions at
//! the boundary of each lower crate, and a secondary status enum (here
//! `TerminationStatus`) for the back-end's own post-solve classification
//! rather than a process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// Bad attribute, unknown parameter name, unsupported operation, degree
    /// exceeded outside a graph context.
    #[error("{0}")]
    UserError(String),

    /// No active graph context, cyclic or ill-formed graph output.
    #[error(transparent)]
    GraphError(#[from] algform_graph::GraphError),

    /// C text or LLVM IR rejected, symbol missing after compile.
    #[error(transparent)]
    CompileError(#[from] algform_jit::JitError),

    /// The differentiation pass itself failed (empty-output graph reached
    /// `optimize()`).
    #[error(transparent)]
    AutodiffError(#[from] algform_autodiff::AutodiffError),

    /// The back-end returned failure on add/delete/solve.
    #[error("solver error: {message} (raw status: {raw_status})")]
    SolverError { message: String, raw_status: String },

    /// Library load failed, required symbol missing.
    #[error("failed to load solver library: {0}")]
    LibraryError(String),
}

impl From<algform_core::CoreError> for ModelError {
    fn from(e: algform_core::CoreError) -> Self {
        ModelError::UserError(e.to_string())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
