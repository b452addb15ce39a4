//! Differentiates and JIT-compiles one structural group's representative
//! graph into the `f`/`jacobian`/`hessian` evaluator triple `model.rs`
//! dispatches against, batching every pending group of one `optimize()`
//! call into a single translation unit (`TccJitModule::compile_batch`/
//! `LlvmJitModule::compile_batch` both amortize their own per-call
//! overhead across many functions).

use crate::config::JitBackend;
use crate::error::ModelResult;
use algform_autodiff::tape::{differentiate, AutodiffArtifact};
use algform_codegen::FunctionSignature;
use algform_graph::NLGraph;
use algform_jit::signature_call::CompiledFn;
use algform_jit::{llvm_jit, tcc_jit, LlvmJitModule, TccJitModule};

/// One compiled group's evaluator triple. `jac`/`hess` are `None` when
/// the group's structure has no nonzero entries (a constant constraint,
/// or an objective contribution that happens not to depend on any
/// variable).
pub(crate) struct CompiledGroup {
    pub artifact: AutodiffArtifact,
    pub f: CompiledFn,
    pub jac: Option<CompiledFn>,
    pub hess: Option<CompiledFn>,
}

pub(crate) enum JitModule {
    Tcc(TccJitModule),
    Llvm(LlvmJitModule),
}

impl JitModule {
    pub fn new(backend: JitBackend) -> ModelResult<Self> {
        Ok(match backend {
            JitBackend::Tcc => JitModule::Tcc(TccJitModule::new()),
            JitBackend::Llvm => JitModule::Llvm(LlvmJitModule::new()?),
        })
    }
}

/// One function to be compiled together with every other pending
/// function this `optimize()` call needs.
struct PendingUnit {
    name: String,
    signature: FunctionSignature,
}

fn f_signature(structure: &algform_autodiff::tape::AutodiffStructure) -> FunctionSignature {
    FunctionSignature {
        np: structure.np,
        hessian_lagrange: false,
        nw: 0,
        indirect_x: true,
        indirect_p: structure.has_parameter,
        indirect_w: false,
        indirect_y: true,
        add_y: false,
    }
}

fn hess_signature(structure: &algform_autodiff::tape::AutodiffStructure) -> FunctionSignature {
    FunctionSignature {
        np: structure.np,
        hessian_lagrange: true,
        nw: structure.ny,
        indirect_x: true,
        indirect_p: structure.has_parameter,
        indirect_w: true,
        indirect_y: true,
        add_y: false,
    }
}

impl CompiledGroup {
    /// `name_prefix` must be unique across every group compiled in the
    /// same batch (`model.rs` uses `cons_g{idx}`/`obj_g{idx}`).
    fn new(artifact: AutodiffArtifact, jit: &JitModule, name_prefix: &str) -> ModelResult<Self> {
        let structure = &artifact.structure;
        let f = jit_get(jit, &format!("{name_prefix}_f"))?;
        let jac = if structure.has_jacobian {
            Some(jit_get(jit, &format!("{name_prefix}_jac"))?)
        } else {
            None
        };
        let hess = if structure.has_hessian {
            Some(jit_get(jit, &format!("{name_prefix}_hess"))?)
        } else {
            None
        };
        Ok(CompiledGroup { artifact, f, jac, hess })
    }
}

fn jit_get(jit: &JitModule, name: &str) -> ModelResult<CompiledFn> {
    match jit {
        JitModule::Tcc(m) => Ok(m.get(name)?),
        JitModule::Llvm(m) => Ok(m.get(name)?),
    }
}

/// Differentiates every `(name_prefix, representative)` pair, compiles
/// every resulting function in one batch, and resolves each group's
/// compiled triple. Order of the returned vector matches `pending`.
pub(crate) fn compile_groups(jit: &mut JitModule, pending: &[(String, NLGraph)]) -> ModelResult<Vec<CompiledGroup>> {
    let artifacts: Vec<AutodiffArtifact> = pending
        .iter()
        .map(|(_, representative)| differentiate(representative))
        .collect::<Result<_, _>>()?;

    let mut units: Vec<PendingUnit> = Vec::new();
    for ((name_prefix, _), artifact) in pending.iter().zip(&artifacts) {
        units.push(PendingUnit {
            name: format!("{name_prefix}_f"),
            signature: f_signature(&artifact.structure),
        });
        if artifact.structure.has_jacobian {
            units.push(PendingUnit {
                name: format!("{name_prefix}_jac"),
                signature: f_signature(&artifact.structure),
            });
        }
        if artifact.structure.has_hessian {
            units.push(PendingUnit {
                name: format!("{name_prefix}_hess"),
                signature: hess_signature(&artifact.structure),
            });
        }
    }

    let mut graph_of: Vec<&NLGraph> = Vec::with_capacity(units.len());
    for artifact in &artifacts {
        graph_of.push(&artifact.f_graph);
        if artifact.structure.has_jacobian {
            graph_of.push(&artifact.jacobian_graph);
        }
        if artifact.structure.has_hessian {
            graph_of.push(&artifact.hessian_graph);
        }
    }

    match jit {
        JitModule::Tcc(m) => {
            let cus: Vec<tcc_jit::CompileUnit> = units
                .iter()
                .zip(&graph_of)
                .map(|(u, &g)| tcc_jit::CompileUnit {
                    name: &u.name,
                    graph: g,
                    sig: u.signature,
                })
                .collect();
            m.compile_batch(&cus)?;
        }
        JitModule::Llvm(m) => {
            let cus: Vec<llvm_jit::CompileUnit> = units
                .iter()
                .zip(&graph_of)
                .map(|(u, &g)| llvm_jit::CompileUnit {
                    name: &u.name,
                    graph: g,
                    sig: u.signature,
                })
                .collect();
            m.compile_batch(&cus)?;
        }
    }

    pending
        .iter()
        .zip(artifacts)
        .map(|((name_prefix, _), artifact)| CompiledGroup::new(artifact, jit, name_prefix))
        .collect()
}
