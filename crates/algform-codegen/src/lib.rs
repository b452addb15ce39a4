//! Lowers an [`algform_graph::NLGraph`] to compilable source: C text (via
//! [`libtcc`](https://github.com/TinyCC/tinycc), see `algform-tcc-sys`)
//! or LLVM IR text (via `inkwell`, see `algform-jit::llvm_jit`). Both
//! backends share the addressing scheme described in
//! [`signature::FunctionSignature`]: one compiled function serves every
//! instance of a structural group, with `indirect_*` flags letting each
//! instance supply its own slot-index arrays instead of requiring
//! contiguous placement.

pub mod c_backend;
pub mod error;
pub mod llvm_backend;
pub mod signature;

pub use error::{CodegenError, CodegenResult};
pub use signature::FunctionSignature;
