//! Errors raised while differentiating an expression graph.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutodiffError {
    /// A graph with neither constraint nor objective outputs was passed
    /// to [`crate::tape::differentiate`]; there is nothing to differentiate.
    #[error("graph has no outputs to differentiate")]
    EmptyOutputs,
}

pub type AutodiffResult<T> = Result<T, AutodiffError>;
