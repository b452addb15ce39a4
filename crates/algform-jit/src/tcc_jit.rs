//! In-process C-text JIT back-end, built on `algform-tcc-sys`.

use crate::error::{JitError, JitResult};
use crate::signature_call::CompiledFn;
use algform_codegen::{c_backend, FunctionSignature};
use algform_graph::NLGraph;
use algform_tcc_sys::TccCompiler;
use std::collections::HashMap;

/// One `(name, graph, signature)` triple to compile together into a
/// single translation unit.
pub struct CompileUnit<'a> {
    pub name: &'a str,
    pub graph: &'a NLGraph,
    pub sig: FunctionSignature,
}

/// Every TCC-compiled translation unit accumulated for one JIT module.
/// libtcc only supports compiling once per `TCCState` (see
/// `algform_tcc_sys::wrapper`'s doc comment), so each `compile_batch`
/// call builds a fresh `TccCompiler` and appends it here rather than
/// reusing an earlier one. That also gives the module the lifetime
/// property it needs: symbols resolved from an earlier unit stay valid
/// after a later `compile_batch` call, since that unit's compiled
/// memory is never touched again.
#[derive(Default)]
pub struct TccJitModule {
    units: Vec<TccCompiler>,
    symbols: HashMap<String, (usize, FunctionSignature)>,
}

impl TccJitModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `functions` into one new translation unit and records
    /// their resolved symbol addresses.
    pub fn compile_batch(&mut self, functions: &[CompileUnit<'_>]) -> JitResult<()> {
        let mut compiler = TccCompiler::new()?;
        let mut source = String::from(c_backend::prelude());
        for unit in functions {
            let (body, _extern_decl) = c_backend::generate(unit.graph, unit.name, &unit.sig)?;
            source.push_str(&body);
            source.push('\n');
        }
        compiler.compile_string(&source)?;
        compiler.relocate()?;
        for unit in functions {
            let addr = compiler.get_symbol(unit.name)?;
            self.symbols.insert(unit.name.to_string(), (addr as usize, unit.sig));
        }
        self.units.push(compiler);
        Ok(())
    }

    /// Looks up a previously compiled symbol by name.
    pub fn get(&self, name: &str) -> JitResult<CompiledFn> {
        let (addr, sig) = self
            .symbols
            .get(name)
            .ok_or_else(|| JitError::SymbolNotFound(name.to_string()))?;
        Ok(CompiledFn::from_raw(*addr as *mut std::ffi::c_void, sig))
    }

    /// Number of translation units compiled so far.
    pub fn unit_count(&self) -> usize {
        self.units.len()
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
        let mut module = TccJitModule::new();
        module
            .compile_batch(&[CompileUnit {
                name: "square0",
                graph: &graph,
                sig,
            }])
            .expect("libtcc compilation of a trivial x*x function");
        assert_eq!(module.unit_count(), 1);

        let compiled = module.get("square0").expect("square0 resolves after compile_batch");
        let x = [3.0];
        let mut y = [0.0];
        unsafe { compiled.call(&x, None, None, &mut y, &[0], None, None, &[0]) };
        assert_eq!(y[0], 9.0);
    }

    #[test]
    fn later_batches_do_not_invalidate_earlier_symbols() {
        let g0 = simple_graph();
        let mut g1 = NLGraph::new();
        let x1 = g1.add_variable(VarIdx::new(0));
        g1.add_objective_output(x1);

        let sig = FunctionSignature {
            indirect_x: true,
            indirect_y: true,
            ..Default::default()
        };
        let mut module = TccJitModule::new();
        module
            .compile_batch(&[CompileUnit {
                name: "square0",
                graph: &g0,
                sig,
            }])
            .unwrap();
        let square0 = module.get("square0").unwrap();

        module
            .compile_batch(&[CompileUnit {
                name: "identity0",
                graph: &g1,
                sig,
            }])
            .unwrap();

        let x = [4.0];
        let mut y = [0.0];
        unsafe { square0.call(&x, None, None, &mut y, &[0], None, None, &[0]) };
        assert_eq!(y[0], 16.0);
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let module = TccJitModule::new();
        assert!(matches!(module.get("nope"), Err(JitError::SymbolNotFound(_))));
    }
}
