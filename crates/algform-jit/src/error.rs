//! Errors raised while JIT-compiling or looking up `algform-codegen` output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JitError {
    #[error(transparent)]
    Codegen(#[from] algform_codegen::CodegenError),
    #[error(transparent)]
    Tcc(#[from] algform_tcc_sys::TccError),
    #[error("failed to parse LLVM IR: {0}")]
    LlvmParse(String),
    #[error("failed to link module into the execution engine: {0}")]
    LlvmLink(String),
    #[error("symbol {0:?} not found in the JIT module")]
    SymbolNotFound(String),
}

pub type JitResult<T> = Result<T, JitError>;
