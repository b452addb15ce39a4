//! In-process native code generation execution for `algform-codegen`
//! output: a libtcc C-text JIT ([`tcc_jit`]) and an LLVM-IR JIT
//! ([`llvm_jit`]), both exposing the same [`signature_call::CompiledFn`]
//! calling convention so `algform-solver` can pick a back-end per solve
//! without changing its evaluator-dispatch code.

pub mod error;
pub mod llvm_jit;
pub mod signature_call;
pub mod tcc_jit;

pub use error::{JitError, JitResult};
pub use llvm_jit::LlvmJitModule;
pub use signature_call::CompiledFn;
pub use tcc_jit::TccJitModule;
