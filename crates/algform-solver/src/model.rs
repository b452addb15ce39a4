//! `NLPModel`: the orchestration layer that ties variables, constraints,
//! and an objective together and drives them through IPOPT.
//!
//! Every constraint and objective contribution is recorded into its own
//! private [`NLGraph`], the way `fold_saf`/`fold_sqf` already do for
//! linear/quadratic terms; nonlinear contributions are folded the same
//! way by the caller before handing the model a root [`NodeId`]. Each
//! private graph is then assigned to a structural group
//! ([`GraphGrouper`]) so that two instances with the same shape (e.g. one
//! subtour-elimination constraint per city pair) differentiate and
//! compile exactly once, caching one formulation across many instances
//! rather than rebuilding it per call.
//!
//! Linear and quadratic constraints are not solved through a separate LP/
//! QP path here: they fold into trivial NLGraphs (all nodes are
//! `Parameter * Variable` products and sums) and flow through the same
//! grouping, differentiation, and compilation pipeline as genuinely
//! nonlinear constraints. IPOPT handles the degenerate (all-zero
//! Hessian, constant Jacobian) case without special-casing.

use crate::compile::{CompiledGroup, JitModule};
use crate::config::{classify, JitBackend, SolveOptions, SolutionStatus, TerminationStatus};
use crate::error::{ModelError, ModelResult};
use algform_core::{ComparisonConstraint, Domain, ExprBuilder, Indexer, Sense, VarIdx};
use algform_graph::{GraphGrouper, GraphHandle, NLGraph, NodeId};
use algform_ipopt_sys::{BasicProblem, ConstrainedProblem, Index as IpoptIndex, Ipopt, Number};
use std::time::Instant;
use tracing::{debug, info};

/// The closed enumeration of constraint shapes §3 describes; see
/// `crate::bridge` for how SOC/rotated-SOC collapse into `Quadratic`
/// before they ever reach [`NLPModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Linear,
    Quadratic,
    SecondOrderCone,
    ExponentialCone,
    Nl,
}

/// A constraint handle stable across additions (and, in principle,
/// deletions — no `delete_constraint` is offered yet, see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(pub u32);

/// Whether the total objective is minimized or maximized. IPOPT itself
/// only minimizes; [`NLPModel::optimize`] negates every objective
/// contribution's evaluation when this is `Maximize` and flips the
/// reported objective value back on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
struct VariableRecord {
    lb: f64,
    ub: f64,
    domain: Domain,
    start: f64,
    name: String,
    value: f64,
    z_l: f64,
    z_u: f64,
}

/// One registered constraint or objective contribution: a private graph
/// plus the variable handles its local slots resolve to and the
/// parameter values that graph's `Parameter` nodes read.
struct Instance {
    group: usize,
    var_handles: Vec<u32>,
    param_values: Vec<f64>,
}

struct ConstraintRecord {
    instance: Instance,
    kind: ConstraintKind,
    lb: f64,
    ub: f64,
    name: String,
    primal: f64,
    dual: f64,
}

/// The algebraic modeling front-end: owns every variable, constraint,
/// and objective contribution, and compiles+solves them on
/// [`optimize`](Self::optimize).
pub struct NLPModel {
    variables: Indexer,
    var_records: Vec<VariableRecord>,

    constraints: Indexer,
    cons_records: Vec<ConstraintRecord>,
    cons_grouper: GraphGrouper,
    cons_compiled: Vec<Option<CompiledGroup>>,

    obj_instances: Vec<Instance>,
    obj_grouper: GraphGrouper,
    obj_compiled: Vec<Option<CompiledGroup>>,
    objective_sense: ObjectiveSense,

    /// Configuration read by [`optimize`](Self::optimize); also the
    /// backing store for the `Silent`/`TimeLimitSec`/JIT-backend model
    /// attributes the adapter exposes (see `crate::adapter`).
    pub options: SolveOptions,
    name: String,
    num_threads: i32,
    solve_time_sec: f64,

    termination_status: TerminationStatus,
    primal_status: SolutionStatus,
    dual_status: SolutionStatus,
    objective_value: f64,
}

impl Default for NLPModel {
    fn default() -> Self {
        Self::new()
    }
}

impl NLPModel {
    pub fn new() -> Self {
        NLPModel {
            variables: Indexer::new(),
            var_records: Vec::new(),
            constraints: Indexer::new(),
            cons_records: Vec::new(),
            cons_grouper: GraphGrouper::new(),
            cons_compiled: Vec::new(),
            obj_instances: Vec::new(),
            obj_grouper: GraphGrouper::new(),
            obj_compiled: Vec::new(),
            objective_sense: ObjectiveSense::default(),
            options: SolveOptions::new(),
            name: String::new(),
            num_threads: 1,
            solve_time_sec: 0.0,
            termination_status: TerminationStatus::default(),
            primal_status: SolutionStatus::default(),
            dual_status: SolutionStatus::default(),
            objective_value: 0.0,
        }
    }

    pub fn objective_sense(&self) -> ObjectiveSense {
        self.objective_sense
    }

    pub fn model_name(&self) -> &str {
        &self.name
    }

    pub fn set_model_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn num_threads(&self) -> i32 {
        self.num_threads
    }

    pub fn set_num_threads(&mut self, n: i32) {
        self.num_threads = n;
    }

    pub fn solve_time_sec(&self) -> f64 {
        self.solve_time_sec
    }

    pub fn solver_name(&self) -> &'static str {
        "IPOPT"
    }

    pub fn solver_version(&self) -> String {
        let (major, minor, release) = algform_ipopt_sys::ipopt_version();
        format!("{major}.{minor}.{release}")
    }

    pub fn num_variables(&self) -> usize {
        self.variables.alive_count()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.alive_count()
    }

    pub fn set_objective_sense(&mut self, sense: ObjectiveSense) {
        self.objective_sense = sense;
    }

    pub fn termination_status(&self) -> TerminationStatus {
        self.termination_status
    }

    pub fn primal_status(&self) -> SolutionStatus {
        self.primal_status
    }

    pub fn dual_status(&self) -> SolutionStatus {
        self.dual_status
    }

    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    pub fn add_variable(&mut self, lb: f64, ub: f64, domain: Domain, start: f64, name: impl Into<String>) -> VarIdx {
        let handle = self.variables.add();
        self.var_records.push(VariableRecord {
            lb,
            ub,
            domain,
            start,
            name: name.into(),
            value: start,
            z_l: 0.0,
            z_u: 0.0,
        });
        debug_assert_eq!(handle as usize, self.var_records.len() - 1);
        VarIdx::new(handle)
    }

    pub fn variable_value(&self, v: VarIdx) -> f64 {
        self.var_records[v.raw() as usize].value
    }

    pub fn variable_bound_multipliers(&self, v: VarIdx) -> (f64, f64) {
        let rec = &self.var_records[v.raw() as usize];
        (rec.z_l, rec.z_u)
    }

    pub fn variable_name(&self, v: VarIdx) -> &str {
        &self.var_records[v.raw() as usize].name
    }

    pub fn variable_domain(&self, v: VarIdx) -> Domain {
        self.var_records[v.raw() as usize].domain
    }

    /// Constraint handles are never deleted (see DESIGN.md), so a
    /// handle's raw value is also its position in `cons_records` and its
    /// row index `i` in `optimize()`'s `g`/Jacobian/Hessian arrays.
    pub fn constraint_name(&self, h: ConstraintHandle) -> &str {
        &self.cons_records[h.0 as usize].name
    }

    pub fn constraint_bounds(&self, h: ConstraintHandle) -> (f64, f64) {
        let rec = &self.cons_records[h.0 as usize];
        (rec.lb, rec.ub)
    }

    /// Bounds implied by a post-`eq_constant`/`leq`/`geq` comparison,
    /// whose `rhs` has already been folded into `lhs.constant` (so it is
    /// always exactly `0.0` here) — the bound derives purely from
    /// `sense` applied to `lhs` evaluated at the origin.
    fn bounds_of_sense(sense: Sense) -> (f64, f64) {
        match sense {
            Sense::Eq => (0.0, 0.0),
            Sense::Leq => (f64::NEG_INFINITY, 0.0),
            Sense::Geq => (0.0, f64::INFINITY),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn register_constraint_instance(
        &mut self,
        graph: NLGraph,
        var_handles: Vec<u32>,
        param_values: Vec<f64>,
        kind: ConstraintKind,
        lb: f64,
        ub: f64,
        name: String,
    ) -> ConstraintHandle {
        let group = self.cons_grouper.assign(&graph);
        if self.cons_compiled.len() <= group {
            self.cons_compiled.resize_with(group + 1, || None);
        }
        let handle = self.constraints.add();
        self.cons_records.push(ConstraintRecord {
            instance: Instance {
                group,
                var_handles,
                param_values,
            },
            kind,
            lb,
            ub,
            name,
            primal: 0.0,
            dual: 0.0,
        });
        debug_assert_eq!(handle as usize, self.cons_records.len() - 1);
        ConstraintHandle(handle)
    }

    pub fn constraint_kind(&self, h: ConstraintHandle) -> ConstraintKind {
        self.cons_records[h.0 as usize].kind
    }

    pub fn constraint_primal(&self, h: ConstraintHandle) -> f64 {
        self.cons_records[h.0 as usize].primal
    }

    pub fn constraint_dual(&self, h: ConstraintHandle) -> f64 {
        self.cons_records[h.0 as usize].dual
    }

    pub fn variable_lower_bound(&self, v: VarIdx) -> f64 {
        self.var_records[v.raw() as usize].lb
    }

    pub fn variable_upper_bound(&self, v: VarIdx) -> f64 {
        self.var_records[v.raw() as usize].ub
    }

    pub fn set_variable_lower_bound(&mut self, v: VarIdx, lb: f64) {
        self.var_records[v.raw() as usize].lb = lb;
    }

    pub fn set_variable_upper_bound(&mut self, v: VarIdx, ub: f64) {
        self.var_records[v.raw() as usize].ub = ub;
    }

    pub fn variable_primal_start(&self, v: VarIdx) -> f64 {
        self.var_records[v.raw() as usize].start
    }

    /// Silently dropped on a deleted variable handle (§7 local recovery
    /// rule), same as every other per-variable setter here: `v.raw()`
    /// indexing into a slot the indexer has marked dead would be a bug
    /// reachable only by misusing a handle after `delete_variable`, which
    /// this model does not yet expose.
    pub fn set_variable_primal_start(&mut self, v: VarIdx, start: f64) {
        self.var_records[v.raw() as usize].start = start;
    }

    pub fn set_variable_name(&mut self, v: VarIdx, name: impl Into<String>) {
        self.var_records[v.raw() as usize].name = name.into();
    }

    pub fn set_variable_domain(&mut self, v: VarIdx, domain: Domain) {
        self.var_records[v.raw() as usize].domain = domain;
    }

    pub fn set_constraint_name(&mut self, h: ConstraintHandle, name: impl Into<String>) {
        self.cons_records[h.0 as usize].name = name.into();
    }

    /// Folds `cc` (produced by `ExprBuilder::eq_constant`/`leq`/`geq`,
    /// degree <= 1) into a private graph and registers it as a
    /// constraint instance.
    pub fn add_linear_constraint(&mut self, cc: ComparisonConstraint, name: impl Into<String>) -> ModelResult<ConstraintHandle> {
        let saf = cc.lhs.into_saf()?;
        let var_handles = saf.variables.iter().map(|v| v.raw()).collect();
        let mut graph = NLGraph::new();
        let (root, param_values) = graph.fold_saf(&saf);
        graph.add_constraint_output(root);
        graph.finalize()?;
        let (lb, ub) = Self::bounds_of_sense(cc.sense);
        Ok(self.register_constraint_instance(graph, var_handles, param_values, ConstraintKind::Linear, lb, ub, name.into()))
    }

    /// Folds `cc` (degree <= 2) into a private graph and registers it as
    /// a constraint instance. `kind` lets `crate::bridge` tag a quadratic
    /// rewrite of a cone constraint with its original cone kind instead
    /// of a plain `Quadratic`, while `add_quadratic_constraint` itself
    /// always reports `Quadratic`.
    pub(crate) fn add_quadratic_constraint_kind(
        &mut self,
        cc: ComparisonConstraint,
        kind: ConstraintKind,
        name: impl Into<String>,
    ) -> ModelResult<ConstraintHandle> {
        let sqf = cc.lhs.into_sqf();
        let mut var_handles: Vec<u32> = sqf.affine_part.variables.iter().map(|v| v.raw()).collect();
        for (&v1, &v2) in sqf.variable_1s.iter().zip(sqf.variable_2s.iter()) {
            var_handles.push(v1.raw());
            var_handles.push(v2.raw());
        }
        let mut graph = NLGraph::new();
        let (root, param_values) = graph.fold_sqf(&sqf);
        graph.add_constraint_output(root);
        graph.finalize()?;
        let (lb, ub) = Self::bounds_of_sense(cc.sense);
        Ok(self.register_constraint_instance(graph, var_handles, param_values, kind, lb, ub, name.into()))
    }

    /// Folds `cc` (degree <= 2) into a private graph and registers it as
    /// a constraint instance.
    pub fn add_quadratic_constraint(&mut self, cc: ComparisonConstraint, name: impl Into<String>) -> ModelResult<ConstraintHandle> {
        self.add_quadratic_constraint_kind(cc, ConstraintKind::Quadratic, name)
    }

    /// Registers an already-recorded nonlinear scalar constraint
    /// `lo <= root(vars) <= hi`. `graph` is expected to have been built
    /// under its own [`GraphHandle`] (see `algform_graph::graph`); a
    /// snapshot of it becomes this constraint's private graph.
    /// `param_values` is bound at record time (one entry per
    /// `new_parameter()` call the caller made while recording `root`'s
    /// subgraph) and is what the compiled function reads as `p` for this
    /// particular instance.
    pub fn add_nl_constraint(
        &mut self,
        graph: &GraphHandle,
        root: NodeId,
        param_values: Vec<f64>,
        lo: f64,
        hi: f64,
        name: impl Into<String>,
    ) -> ModelResult<ConstraintHandle> {
        let mut snapshot = graph.snapshot();
        let var_handles: Vec<u32> = snapshot.variables().iter().map(|v| v.raw()).collect();
        debug_assert_eq!(param_values.len(), snapshot.n_parameters());
        snapshot.add_constraint_output(root);
        snapshot.finalize()?;
        Ok(self.register_constraint_instance(snapshot, var_handles, param_values, ConstraintKind::Nl, lo, hi, name.into()))
    }

    /// Same as [`add_nl_constraint`](Self::add_nl_constraint) but tags the
    /// registered instance with a cone kind other than `Nl` (used by
    /// `crate::bridge`'s exponential-cone rewrite).
    pub(crate) fn add_nl_constraint_kind(
        &mut self,
        graph: &GraphHandle,
        root: NodeId,
        param_values: Vec<f64>,
        kind: ConstraintKind,
        lo: f64,
        hi: f64,
        name: impl Into<String>,
    ) -> ModelResult<ConstraintHandle> {
        let mut snapshot = graph.snapshot();
        let var_handles: Vec<u32> = snapshot.variables().iter().map(|v| v.raw()).collect();
        debug_assert_eq!(param_values.len(), snapshot.n_parameters());
        snapshot.add_constraint_output(root);
        snapshot.finalize()?;
        Ok(self.register_constraint_instance(snapshot, var_handles, param_values, kind, lo, hi, name.into()))
    }

    /// Adds one contribution to the total objective (summed across every
    /// call, whether `set_objective` or `add_nl_objective`): the natural
    /// shape for accumulating one term per element of a sum, e.g. a
    /// discretized integral over many collocation points, instead of a
    /// single monolithic expression.
    fn register_objective_instance(&mut self, graph: NLGraph, var_handles: Vec<u32>, param_values: Vec<f64>) {
        let group = self.obj_grouper.assign(&graph);
        if self.obj_compiled.len() <= group {
            self.obj_compiled.resize_with(group + 1, || None);
        }
        self.obj_instances.push(Instance {
            group,
            var_handles,
            param_values,
        });
    }

    /// Folds a degree <= 2 objective contribution.
    pub fn set_objective(&mut self, builder: ExprBuilder) -> ModelResult<()> {
        let sqf = builder.into_sqf();
        let mut var_handles: Vec<u32> = sqf.affine_part.variables.iter().map(|v| v.raw()).collect();
        for (&v1, &v2) in sqf.variable_1s.iter().zip(sqf.variable_2s.iter()) {
            var_handles.push(v1.raw());
            var_handles.push(v2.raw());
        }
        let mut graph = NLGraph::new();
        let (root, param_values) = graph.fold_sqf(&sqf);
        graph.add_objective_output(root);
        graph.finalize()?;
        self.register_objective_instance(graph, var_handles, param_values);
        Ok(())
    }

    /// Registers `root(vars)` as a nonlinear objective contribution.
    /// See [`add_nl_constraint`](Self::add_nl_constraint) for
    /// `param_values`.
    pub fn add_nl_objective(&mut self, graph: &GraphHandle, root: NodeId, param_values: Vec<f64>) -> ModelResult<()> {
        let mut snapshot = graph.snapshot();
        let var_handles: Vec<u32> = snapshot.variables().iter().map(|v| v.raw()).collect();
        debug_assert_eq!(param_values.len(), snapshot.n_parameters());
        snapshot.add_objective_output(root);
        snapshot.finalize()?;
        self.register_objective_instance(snapshot, var_handles, param_values);
        Ok(())
    }

    fn compile_pending_groups(&mut self, backend: JitBackend) -> ModelResult<()> {
        let mut pending: Vec<(String, NLGraph)> = Vec::new();
        let mut cons_idx = Vec::new();
        for (idx, group) in self.cons_grouper.groups().iter().enumerate() {
            if self.cons_compiled[idx].is_none() {
                pending.push((format!("cons_g{idx}"), group.representative.clone()));
                cons_idx.push(idx);
            }
        }
        let n_cons_pending = cons_idx.len();
        let mut obj_idx = Vec::new();
        for (idx, group) in self.obj_grouper.groups().iter().enumerate() {
            if self.obj_compiled[idx].is_none() {
                pending.push((format!("obj_g{idx}"), group.representative.clone()));
                obj_idx.push(idx);
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let mut jit = JitModule::new(backend)?;
        let compiled = crate::compile::compile_groups(&mut jit, &pending)?;
        let mut compiled = compiled.into_iter();

        for idx in cons_idx {
            self.cons_compiled[idx] = Some(compiled.next().expect("one compiled group per pending entry"));
        }
        for idx in obj_idx {
            self.obj_compiled[idx] = Some(compiled.next().expect("one compiled group per pending entry"));
        }

        info!(cons_groups_compiled = n_cons_pending, "compiled pending structural groups");
        Ok(())
    }

    /// Differentiates and compiles any not-yet-compiled structural
    /// groups, builds the IPOPT callback layout, and solves using
    /// `self.options` (see [`SolveOptions`] — the `Silent`/`TimeLimitSec`/
    /// `NumberOfThreads` model attributes of §6 all read and write this
    /// same field through `crate::adapter`).
    pub fn optimize(&mut self) -> ModelResult<()> {
        let jit_backend = self.options.jit_backend;
        self.compile_pending_groups(jit_backend)?;

        let layout = Layout::build(self)?;
        let options = self.options.clone();
        let problem = NlpProblem { model: self, layout };

        let mut solver = Ipopt::new(problem).map_err(|e| ModelError::SolverError {
            message: e,
            raw_status: "init".to_string(),
        })?;

        if options.silent {
            solver.set_int_option("print_level", 0);
            solver.set_string_option("sb", "yes");
        }
        if let Some(max_iter) = options.max_iterations {
            solver.set_int_option("max_iter", max_iter);
        }
        if let Some(t) = options.time_limit_sec {
            solver.set_num_option("max_cpu_time", t);
        }
        for (name, value) in &options.raw_options {
            match value {
                crate::config::RawOptionValue::Int(v) => solver.set_int_option(name, *v),
                crate::config::RawOptionValue::Num(v) => solver.set_num_option(name, *v),
                crate::config::RawOptionValue::Str(v) => solver.set_string_option(name, v),
            }
        }

        let started = Instant::now();
        let result = solver.solve();
        self.solve_time_sec = started.elapsed().as_secs_f64();

        let (term, primal, dual) = classify(result.status);
        self.termination_status = term;
        self.primal_status = primal;
        self.dual_status = dual;

        let sense_sign = match self.objective_sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        self.objective_value = sense_sign * result.objective_value;

        let sol = result.solver_data.solution;
        for (h, rec) in self.var_records.iter_mut().enumerate() {
            if let Some(idx) = self.variables.is_alive(h as u32).then(|| self.variables.get_index(h as u32) as usize) {
                rec.value = sol.primal_variables[idx];
                rec.z_l = sol.lower_bound_multipliers[idx];
                rec.z_u = sol.upper_bound_multipliers[idx];
            }
        }
        for (i, rec) in self.cons_records.iter_mut().enumerate() {
            rec.primal = sol.constraint_values[i];
            rec.dual = sol.constraint_multipliers[i];
        }

        debug!(status = ?result.status, objective = self.objective_value, "optimize finished");
        Ok(())
    }
}

/// Variable dense-index lookup plus every per-instance offset needed to
/// scatter a compiled call's local output into the global g/grad_f/
/// Jacobian/Hessian arrays, built fresh at the start of each `optimize`
/// call (variable indices can shift between solves if variables were
/// ever deleted).
struct Layout {
    nx: usize,
    cons_var_idx: Vec<Vec<usize>>,
    obj_var_idx: Vec<Vec<usize>>,
    jac_offset: Vec<usize>,
    total_jac_nnz: usize,
    obj_hess_offset: Vec<usize>,
    cons_hess_offset: Vec<usize>,
    total_hess_nnz: usize,
}

impl Layout {
    fn build(model: &NLPModel) -> ModelResult<Self> {
        let nx = model.variables.alive_count();

        let var_idx_of = |handles: &[u32]| -> Vec<usize> {
            handles
                .iter()
                .map(|&h| model.variables.get_index(h) as usize)
                .collect()
        };

        let cons_var_idx: Vec<Vec<usize>> = model
            .cons_records
            .iter()
            .map(|r| var_idx_of(&r.instance.var_handles))
            .collect();
        let obj_var_idx: Vec<Vec<usize>> = model
            .obj_instances
            .iter()
            .map(|inst| var_idx_of(&inst.var_handles))
            .collect();

        let mut jac_offset = Vec::with_capacity(model.cons_records.len());
        let mut running = 0usize;
        for rec in &model.cons_records {
            jac_offset.push(running);
            let compiled = model.cons_compiled[rec.instance.group]
                .as_ref()
                .expect("compile_pending_groups compiled every group before Layout::build");
            running += compiled.artifact.structure.nnz_jac;
        }
        let total_jac_nnz = running;

        let mut obj_hess_offset = Vec::with_capacity(model.obj_instances.len());
        let mut running = 0usize;
        for inst in &model.obj_instances {
            obj_hess_offset.push(running);
            let compiled = model.obj_compiled[inst.group]
                .as_ref()
                .expect("compile_pending_groups compiled every group before Layout::build");
            running += compiled.artifact.structure.nnz_hess;
        }
        let obj_hess_total = running;

        let mut cons_hess_offset = Vec::with_capacity(model.cons_records.len());
        let mut running = obj_hess_total;
        for rec in &model.cons_records {
            cons_hess_offset.push(running);
            let compiled = model.cons_compiled[rec.instance.group]
                .as_ref()
                .expect("compile_pending_groups compiled every group before Layout::build");
            running += compiled.artifact.structure.nnz_hess;
        }
        let total_hess_nnz = running;

        Ok(Layout {
            nx,
            cons_var_idx,
            obj_var_idx,
            jac_offset,
            total_jac_nnz,
            obj_hess_offset,
            cons_hess_offset,
            total_hess_nnz,
        })
    }
}

/// Swaps `(r, c)` so the lower triangle (`row >= col`) is stored, the
/// global analogue of the local invariant `algform_autodiff::tape`
/// already guarantees in slot numbering — remapping local slots to
/// arbitrary global variable indices can invert it.
fn lower(r: usize, c: usize) -> (usize, usize) {
    if r >= c {
        (r, c)
    } else {
        (c, r)
    }
}

struct NlpProblem<'a> {
    model: &'a NLPModel,
    layout: Layout,
}

impl<'a> BasicProblem for NlpProblem<'a> {
    fn num_variables(&self) -> usize {
        self.layout.nx
    }

    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
        for (h, rec) in self.model.var_records.iter().enumerate() {
            if self.model.variables.is_alive(h as u32) {
                let idx = self.model.variables.get_index(h as u32) as usize;
                x_l[idx] = rec.lb;
                x_u[idx] = rec.ub;
            }
        }
        true
    }

    fn initial_point(&self, x: &mut [Number]) -> bool {
        for (h, rec) in self.model.var_records.iter().enumerate() {
            if self.model.variables.is_alive(h as u32) {
                let idx = self.model.variables.get_index(h as u32) as usize;
                x[idx] = rec.start;
            }
        }
        true
    }

    fn objective(&self, x: &[Number], _new_x: bool, obj: &mut Number) -> bool {
        let sense_sign = match self.model.objective_sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        let mut total = 0.0;
        for (i, inst) in self.model.obj_instances.iter().enumerate() {
            let compiled = self.model.obj_compiled[inst.group].as_ref().unwrap();
            let xi = &self.layout.obj_var_idx[i];
            let mut y = [0.0f64];
            let yi = [0usize];
            let pi: Vec<usize> = (0..inst.param_values.len()).collect();
            unsafe {
                compiled.f.call(
                    x,
                    Some(&inst.param_values),
                    None,
                    &mut y,
                    xi,
                    Some(&pi),
                    None,
                    &yi,
                );
            }
            total += y[0];
        }
        *obj = sense_sign * total;
        true
    }

    fn objective_grad(&self, x: &[Number], _new_x: bool, grad_f: &mut [Number]) -> bool {
        let sense_sign = match self.model.objective_sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        for g in grad_f.iter_mut() {
            *g = 0.0;
        }
        for (i, inst) in self.model.obj_instances.iter().enumerate() {
            let compiled = self.model.obj_compiled[inst.group].as_ref().unwrap();
            let Some(jac) = compiled.jac.as_ref() else { continue };
            let xi = &self.layout.obj_var_idx[i];
            let structure = &compiled.artifact.structure;
            let nnz = structure.nnz_jac;
            let mut y = vec![0.0; nnz];
            let yi: Vec<usize> = (0..nnz).collect();
            let pi: Vec<usize> = (0..inst.param_values.len()).collect();
            unsafe {
                jac.call(x, Some(&inst.param_values), None, &mut y, xi, Some(&pi), None, &yi);
            }
            for (k, &col) in structure.jac_cols.iter().enumerate() {
                grad_f[xi[col]] += sense_sign * y[k];
            }
        }
        true
    }
}

impl<'a> ConstrainedProblem for NlpProblem<'a> {
    fn num_constraints(&self) -> usize {
        self.model.cons_records.len()
    }

    fn num_constraint_jacobian_non_zeros(&self) -> usize {
        self.layout.total_jac_nnz
    }

    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool {
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            g_l[i] = rec.lb;
            g_u[i] = rec.ub;
        }
        true
    }

    fn constraint(&self, x: &[Number], _new_x: bool, g: &mut [Number]) -> bool {
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            let compiled = self.model.cons_compiled[rec.instance.group].as_ref().unwrap();
            let xi = &self.layout.cons_var_idx[i];
            let mut y = [0.0f64];
            let yi = [0usize];
            let pi: Vec<usize> = (0..rec.instance.param_values.len()).collect();
            unsafe {
                compiled.f.call(
                    x,
                    Some(&rec.instance.param_values),
                    None,
                    &mut y,
                    xi,
                    Some(&pi),
                    None,
                    &yi,
                );
            }
            g[i] = y[0];
        }
        true
    }

    fn constraint_jacobian_indices(&self, irow: &mut [IpoptIndex], jcol: &mut [IpoptIndex]) -> bool {
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            let compiled = self.model.cons_compiled[rec.instance.group].as_ref().unwrap();
            let xi = &self.layout.cons_var_idx[i];
            let offset = self.layout.jac_offset[i];
            for (k, &col) in compiled.artifact.structure.jac_cols.iter().enumerate() {
                irow[offset + k] = i as IpoptIndex;
                jcol[offset + k] = xi[col] as IpoptIndex;
            }
        }
        true
    }

    fn constraint_jacobian_values(&self, x: &[Number], _new_x: bool, vals: &mut [Number]) -> bool {
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            let compiled = self.model.cons_compiled[rec.instance.group].as_ref().unwrap();
            let Some(jac) = compiled.jac.as_ref() else { continue };
            let xi = &self.layout.cons_var_idx[i];
            let offset = self.layout.jac_offset[i];
            let nnz = compiled.artifact.structure.nnz_jac;
            let mut y = vec![0.0; nnz];
            let yi: Vec<usize> = (0..nnz).collect();
            let pi: Vec<usize> = (0..rec.instance.param_values.len()).collect();
            unsafe {
                jac.call(
                    x,
                    Some(&rec.instance.param_values),
                    None,
                    &mut y,
                    xi,
                    Some(&pi),
                    None,
                    &yi,
                );
            }
            vals[offset..offset + nnz].copy_from_slice(&y);
        }
        true
    }

    fn num_hessian_non_zeros(&self) -> usize {
        self.layout.total_hess_nnz
    }

    fn hessian_indices(&self, irow: &mut [IpoptIndex], jcol: &mut [IpoptIndex]) -> bool {
        for (i, inst) in self.model.obj_instances.iter().enumerate() {
            let compiled = self.model.obj_compiled[inst.group].as_ref().unwrap();
            let xi = &self.layout.obj_var_idx[i];
            let offset = self.layout.obj_hess_offset[i];
            let structure = &compiled.artifact.structure;
            for (k, (&row, &col)) in structure.hess_rows.iter().zip(&structure.hess_cols).enumerate() {
                let (gr, gc) = lower(xi[row], xi[col]);
                irow[offset + k] = gr as IpoptIndex;
                jcol[offset + k] = gc as IpoptIndex;
            }
        }
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            let compiled = self.model.cons_compiled[rec.instance.group].as_ref().unwrap();
            let xi = &self.layout.cons_var_idx[i];
            let offset = self.layout.cons_hess_offset[i];
            let structure = &compiled.artifact.structure;
            for (k, (&row, &col)) in structure.hess_rows.iter().zip(&structure.hess_cols).enumerate() {
                let (gr, gc) = lower(xi[row], xi[col]);
                irow[offset + k] = gr as IpoptIndex;
                jcol[offset + k] = gc as IpoptIndex;
            }
        }
        true
    }

    fn hessian_values(
        &self,
        x: &[Number],
        _new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        vals: &mut [Number],
    ) -> bool {
        let sense_sign = match self.model.objective_sense {
            ObjectiveSense::Minimize => 1.0,
            ObjectiveSense::Maximize => -1.0,
        };
        for (i, inst) in self.model.obj_instances.iter().enumerate() {
            let compiled = self.model.obj_compiled[inst.group].as_ref().unwrap();
            let offset = self.layout.obj_hess_offset[i];
            let nnz = compiled.artifact.structure.nnz_hess;
            if nnz == 0 {
                continue;
            }
            let Some(hess) = compiled.hess.as_ref() else { continue };
            let xi = &self.layout.obj_var_idx[i];
            let w = [sense_sign * obj_factor];
            let wi = [0usize];
            let mut y = vec![0.0; nnz];
            let yi: Vec<usize> = (0..nnz).collect();
            let pi: Vec<usize> = (0..inst.param_values.len()).collect();
            unsafe {
                hess.call(x, Some(&inst.param_values), Some(&w), &mut y, xi, Some(&pi), Some(&wi), &yi);
            }
            vals[offset..offset + nnz].copy_from_slice(&y);
        }
        for (i, rec) in self.model.cons_records.iter().enumerate() {
            let compiled = self.model.cons_compiled[rec.instance.group].as_ref().unwrap();
            let offset = self.layout.cons_hess_offset[i];
            let nnz = compiled.artifact.structure.nnz_hess;
            if nnz == 0 {
                continue;
            }
            let Some(hess) = compiled.hess.as_ref() else { continue };
            let xi = &self.layout.cons_var_idx[i];
            let w = [lambda[i]];
            let wi = [0usize];
            let mut y = vec![0.0; nnz];
            let yi: Vec<usize> = (0..nnz).collect();
            let pi: Vec<usize> = (0..rec.instance.param_values.len()).collect();
            unsafe {
                hess.call(x, Some(&rec.instance.param_values), Some(&w), &mut y, xi, Some(&pi), Some(&wi), &yi);
            }
            vals[offset..offset + nnz].copy_from_slice(&y);
        }
        true
    }
}
