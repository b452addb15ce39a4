//! In-process LLVM-IR JIT back-end, built on `inkwell`'s MCJIT execution
//! engine. The sibling of `tcc_jit`, for callers that want LLVM's
//! optimizer passes between codegen and execution rather than libtcc's
//! near-zero-overhead compile.

use crate::error::{JitError, JitResult};
use crate::signature_call::CompiledFn;
use algform_codegen::{llvm_backend, FunctionSignature};
use algform_graph::NLGraph;
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::OptimizationLevel;
use std::collections::HashMap;

/// One `(name, graph, signature)` triple to lower and link.
pub struct CompileUnit<'a> {
    pub name: &'a str,
    pub graph: &'a NLGraph,
    pub sig: FunctionSignature,
}

/// Owns the LLVM context for the module's whole lifetime. `inkwell`'s
/// `Module`/`ExecutionEngine` borrow their `Context`, so this leaks one
/// `Context` per `LlvmJitModule` to get a `'static` lifetime instead of
/// threading a borrow through every field here; the leak is reclaimed at
/// process exit, which matches this module's own lifecycle ("lives until
/// the next rebuild" -- a rebuild constructs a fresh `LlvmJitModule`
/// rather than mutating this one).
pub struct LlvmJitModule {
    context: &'static Context,
    engine: ExecutionEngine<'static>,
    symbols: HashMap<String, FunctionSignature>,
}

impl LlvmJitModule {
    pub fn new() -> JitResult<Self> {
        let context: &'static Context = Box::leak(Box::new(Context::create()));
        let seed = context.create_module("algform_seed");
        let engine = seed
            .create_jit_execution_engine(OptimizationLevel::Default)
            .map_err(|e| JitError::LlvmLink(e.to_string()))?;
        Ok(LlvmJitModule {
            context,
            engine,
            symbols: HashMap::new(),
        })
    }

    /// Lowers `functions` to LLVM IR text, parses each into a module
    /// sharing this instance's context, and links it into the running
    /// execution engine.
    pub fn compile_batch(&mut self, functions: &[CompileUnit<'_>]) -> JitResult<()> {
        for unit in functions {
            let ir_text = llvm_backend::generate(unit.graph, unit.name, &unit.sig)?;
            let buffer = MemoryBuffer::create_from_memory_range_copy(ir_text.as_bytes(), unit.name);
            let parsed = self
                .context
                .create_module_from_ir(buffer)
                .map_err(|e| JitError::LlvmParse(e.to_string()))?;
            self.engine
                .add_module(&parsed)
                .map_err(|()| JitError::LlvmLink(format!("module for {:?} was already linked", unit.name)))?;
            self.symbols.insert(unit.name.to_string(), unit.sig);
        }
        Ok(())
    }

    /// Looks up a previously compiled symbol by name.
    pub fn get(&self, name: &str) -> JitResult<CompiledFn> {
        let sig = self
            .symbols
            .get(name)
            .ok_or_else(|| JitError::SymbolNotFound(name.to_string()))?;
        let addr = self
            .engine
            .get_function_address(name)
            .map_err(|_| JitError::SymbolNotFound(name.to_string()))?;
        Ok(CompiledFn::from_raw(addr as *mut std::ffi::c_void, sig))
    }

    /// Number of symbols resolvable through this module.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;

    fn simple_graph() -> NLGraph {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let sq = g.mul(x, x);
        g.add_objective_output(sq);
        g
    }

    #[test]
    fn compile_batch_resolves_and_calls_the_function() {
        let graph = simple_graph();
        let sig = FunctionSignature {
            indirect_x: true,
            indirect_y: true,
            ..Default::default()
        };
        let mut module = LlvmJitModule::new().expect("inkwell execution engine creation");
        module
            .compile_batch(&[CompileUnit {
                name: "llvm_square0",
                graph: &graph,
                sig,
            }])
            .expect("linking a trivial x*x module");
        assert_eq!(module.symbol_count(), 1);

        let compiled = module.get("llvm_square0").expect("llvm_square0 resolves after compile_batch");
        let x = [5.0];
        let mut y = [0.0];
        unsafe { compiled.call(&x, None, None, &mut y, &[0], None, None, &[0]) };
        assert_eq!(y[0], 25.0);
    }
}
