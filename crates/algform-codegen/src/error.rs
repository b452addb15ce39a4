//! Errors raised while lowering an [`algform_graph::NLGraph`] to source.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("graph has no outputs to compile into a function")]
    EmptyOutputs,
    #[error("node {0} references a node id that was never recorded")]
    DanglingNode(u32),
}

pub type CodegenResult<T> = Result<T, CodegenError>;
