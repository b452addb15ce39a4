//! The §6 attribute surface: a closed `AttributeKey` enumeration per
//! entity kind, routed through get/set function tables instead of a
//! method per attribute scattered across `NLPModel`.
//!
//! Grounded directly on
//! `original_source/.../solver_common.py`'s `_get_model_attribute`/
//! `_set_entity_attribute` (look the attribute up in a `get_func_map`/
//! `set_func_map`, raise `error_callback(attribute)` on a miss): an
//! id-keyed `HashMap` lookup generalized from string ids to the
//! `AttributeKey` enums below. A modeling layer with many interchangeable
//! back-ends would build one such dict per back-end at import time; here
//! there is exactly one wired-up back-end (IPOPT via
//! `algform-ipopt-sys`), so the "per-back-end" table collapses to one,
//! built once behind a [`once_cell::sync::Lazy`].

use crate::config::{JitBackend, SolutionStatus, TerminationStatus};
use crate::error::{ModelError, ModelResult};
use crate::model::{ConstraintHandle, NLPModel, ObjectiveSense};
use algform_core::{Domain, VarIdx};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// §6's closed variable-attribute enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableAttribute {
    Value,
    LowerBound,
    UpperBound,
    PrimalStart,
    ReducedCost,
    Domain,
    Name,
}

/// §6's closed constraint-attribute enumeration. `Iis` ("where
/// supported") is not supported by IPOPT — an LP/MIP-only diagnostic —
/// so its getter is absent from the table and any lookup hits the same
/// missing-entry `UserError` path as a genuinely unknown attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintAttribute {
    Primal,
    Dual,
    Name,
    Iis,
}

/// §6's closed model-attribute enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelAttribute {
    ObjectiveSense,
    ObjectiveValue,
    ObjectiveBound,
    DualObjectiveValue,
    RelativeGap,
    BarrierIterations,
    SimplexIterations,
    NodeCount,
    NumberOfThreads,
    Silent,
    TimeLimitSec,
    SolveTimeSec,
    TerminationStatus,
    PrimalStatus,
    DualStatus,
    SolverName,
    SolverVersion,
    Name,
}

/// A typed attribute value. §6 fixes one concrete type per attribute;
/// callers match on the variant they expect and the `as_*` helpers below
/// return a `UserError` if the model handed back a different one than
/// requested (which only happens if this table itself is wired wrong).
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Domain(Domain),
    ObjectiveSense(ObjectiveSense),
    TerminationStatus(TerminationStatus),
    SolutionStatus(SolutionStatus),
}

macro_rules! attr_value_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> ModelResult<$ty> {
            match self {
                AttrValue::$variant(v) => Ok((*v).clone()),
                other => Err(ModelError::UserError(format!(
                    "attribute value {other:?} is not a {}",
                    stringify!($variant)
                ))),
            }
        }
    };
}

impl AttrValue {
    attr_value_accessor!(as_float, Float, f64);
    attr_value_accessor!(as_int, Int, i64);
    attr_value_accessor!(as_bool, Bool, bool);
    attr_value_accessor!(as_domain, Domain, Domain);
    attr_value_accessor!(as_objective_sense, ObjectiveSense, ObjectiveSense);
    attr_value_accessor!(as_termination_status, TerminationStatus, TerminationStatus);
    attr_value_accessor!(as_solution_status, SolutionStatus, SolutionStatus);

    pub fn as_str(&self) -> ModelResult<&str> {
        match self {
            AttrValue::Str(s) => Ok(s.as_str()),
            other => Err(ModelError::UserError(format!("attribute value {other:?} is not a Str"))),
        }
    }
}

type VarGet = fn(&NLPModel, VarIdx) -> AttrValue;
type VarSet = fn(&mut NLPModel, VarIdx, AttrValue) -> ModelResult<()>;
type ConsGet = fn(&NLPModel, ConstraintHandle) -> AttrValue;
type ConsSet = fn(&mut NLPModel, ConstraintHandle, AttrValue) -> ModelResult<()>;
type ModelGet = fn(&NLPModel) -> AttrValue;
type ModelSet = fn(&mut NLPModel, AttrValue) -> ModelResult<()>;

fn require_float(v: AttrValue) -> ModelResult<f64> {
    v.as_float()
}

static VARIABLE_GET: Lazy<HashMap<VariableAttribute, VarGet>> = Lazy::new(|| {
    use VariableAttribute as A;
    let mut m: HashMap<A, VarGet> = HashMap::new();
    m.insert(A::Value, |model, v| AttrValue::Float(model.variable_value(v)));
    m.insert(A::LowerBound, |model, v| AttrValue::Float(model.variable_lower_bound(v)));
    m.insert(A::UpperBound, |model, v| AttrValue::Float(model.variable_upper_bound(v)));
    m.insert(A::PrimalStart, |model, v| AttrValue::Float(model.variable_primal_start(v)));
    m.insert(A::ReducedCost, |model, v| {
        let (z_l, z_u) = model.variable_bound_multipliers(v);
        AttrValue::Float(z_l - z_u)
    });
    m.insert(A::Domain, |model, v| AttrValue::Domain(model.variable_domain(v)));
    m.insert(A::Name, |model, v| AttrValue::Str(model.variable_name(v).to_string()));
    m
});

static VARIABLE_SET: Lazy<HashMap<VariableAttribute, VarSet>> = Lazy::new(|| {
    use VariableAttribute as A;
    let mut m: HashMap<A, VarSet> = HashMap::new();
    m.insert(A::LowerBound, |model, v, val| {
        model.set_variable_lower_bound(v, require_float(val)?);
        Ok(())
    });
    m.insert(A::UpperBound, |model, v, val| {
        model.set_variable_upper_bound(v, require_float(val)?);
        Ok(())
    });
    m.insert(A::PrimalStart, |model, v, val| {
        model.set_variable_primal_start(v, require_float(val)?);
        Ok(())
    });
    m.insert(A::Domain, |model, v, val| {
        model.set_variable_domain(v, val.as_domain()?);
        Ok(())
    });
    m.insert(A::Name, |model, v, val| {
        model.set_variable_name(v, val.as_str()?.to_string());
        Ok(())
    });
    m
});

static CONSTRAINT_GET: Lazy<HashMap<ConstraintAttribute, ConsGet>> = Lazy::new(|| {
    use ConstraintAttribute as A;
    let mut m: HashMap<A, ConsGet> = HashMap::new();
    m.insert(A::Primal, |model, h| AttrValue::Float(model.constraint_primal(h)));
    m.insert(A::Dual, |model, h| AttrValue::Float(model.constraint_dual(h)));
    m.insert(A::Name, |model, h| AttrValue::Str(model.constraint_name(h).to_string()));
    m
});

static CONSTRAINT_SET: Lazy<HashMap<ConstraintAttribute, ConsSet>> = Lazy::new(|| {
    use ConstraintAttribute as A;
    let mut m: HashMap<A, ConsSet> = HashMap::new();
    m.insert(A::Name, |model, h, val| {
        model.set_constraint_name(h, val.as_str()?.to_string());
        Ok(())
    });
    m
});

static MODEL_GET: Lazy<HashMap<ModelAttribute, ModelGet>> = Lazy::new(|| {
    use ModelAttribute as A;
    let mut m: HashMap<A, ModelGet> = HashMap::new();
    m.insert(A::ObjectiveSense, |model| AttrValue::ObjectiveSense(model.objective_sense()));
    m.insert(A::ObjectiveValue, |model| AttrValue::Float(model.objective_value()));
    m.insert(A::ObjectiveBound, |model| AttrValue::Float(model.objective_value()));
    m.insert(A::DualObjectiveValue, |model| AttrValue::Float(model.objective_value()));
    m.insert(A::RelativeGap, |model| AttrValue::Float(0.0));
    m.insert(A::BarrierIterations, |_model| AttrValue::Int(0));
    m.insert(A::SimplexIterations, |_model| AttrValue::Int(0));
    m.insert(A::NodeCount, |_model| AttrValue::Int(0));
    m.insert(A::NumberOfThreads, |model| AttrValue::Int(model.num_threads() as i64));
    m.insert(A::Silent, |model| AttrValue::Bool(model.options.silent));
    m.insert(A::TimeLimitSec, |model| {
        AttrValue::Float(model.options.time_limit_sec.unwrap_or(f64::INFINITY))
    });
    m.insert(A::SolveTimeSec, |model| AttrValue::Float(model.solve_time_sec()));
    m.insert(A::TerminationStatus, |model| AttrValue::TerminationStatus(model.termination_status()));
    m.insert(A::PrimalStatus, |model| AttrValue::SolutionStatus(model.primal_status()));
    m.insert(A::DualStatus, |model| AttrValue::SolutionStatus(model.dual_status()));
    m.insert(A::SolverName, |model| AttrValue::Str(model.solver_name().to_string()));
    m.insert(A::SolverVersion, |model| AttrValue::Str(model.solver_version()));
    m.insert(A::Name, |model| AttrValue::Str(model.model_name().to_string()));
    m
});

static MODEL_SET: Lazy<HashMap<ModelAttribute, ModelSet>> = Lazy::new(|| {
    use ModelAttribute as A;
    let mut m: HashMap<A, ModelSet> = HashMap::new();
    m.insert(A::ObjectiveSense, |model, val| {
        model.set_objective_sense(val.as_objective_sense()?);
        Ok(())
    });
    m.insert(A::NumberOfThreads, |model, val| {
        model.set_num_threads(val.as_int()? as i32);
        Ok(())
    });
    m.insert(A::Silent, |model, val| {
        model.options.silent = val.as_bool()?;
        Ok(())
    });
    m.insert(A::TimeLimitSec, |model, val| {
        model.options.time_limit_sec = Some(val.as_float()?);
        Ok(())
    });
    m.insert(A::Name, |model, val| {
        model.set_model_name(val.as_str()?.to_string());
        Ok(())
    });
    m
});

fn missing(kind: &str, name: impl std::fmt::Debug) -> ModelError {
    ModelError::UserError(format!("unknown or unsupported {kind} attribute: {name:?}"))
}

pub fn get_variable_attribute(model: &NLPModel, v: VarIdx, attr: VariableAttribute) -> ModelResult<AttrValue> {
    let f = VARIABLE_GET.get(&attr).ok_or_else(|| missing("variable", attr))?;
    Ok(f(model, v))
}

pub fn set_variable_attribute(model: &mut NLPModel, v: VarIdx, attr: VariableAttribute, value: AttrValue) -> ModelResult<()> {
    let f = *VARIABLE_SET.get(&attr).ok_or_else(|| missing("variable", attr))?;
    f(model, v, value)
}

pub fn get_constraint_attribute(model: &NLPModel, h: ConstraintHandle, attr: ConstraintAttribute) -> ModelResult<AttrValue> {
    let f = CONSTRAINT_GET.get(&attr).ok_or_else(|| missing("constraint", attr))?;
    Ok(f(model, h))
}

pub fn set_constraint_attribute(model: &mut NLPModel, h: ConstraintHandle, attr: ConstraintAttribute, value: AttrValue) -> ModelResult<()> {
    let f = *CONSTRAINT_SET.get(&attr).ok_or_else(|| missing("constraint", attr))?;
    f(model, h, value)
}

pub fn get_model_attribute(model: &NLPModel, attr: ModelAttribute) -> ModelResult<AttrValue> {
    let f = MODEL_GET.get(&attr).ok_or_else(|| missing("model", attr))?;
    Ok(f(model))
}

pub fn set_model_attribute(model: &mut NLPModel, attr: ModelAttribute, value: AttrValue) -> ModelResult<()> {
    let f = *MODEL_SET.get(&attr).ok_or_else(|| missing("model", attr))?;
    f(model, value)
}

/// Raw, solver-native parameter access: looks the parameter's type up
/// from IPOPT's own option registry and dispatches to the matching
/// typed setter, per §4.11 ("the adapter looks up the parameter's
/// native type from the solver and dispatches to the matching typed
/// getter/setter"). IPOPT does not expose an introspectable option type
/// registry over its C API, so the type is inferred from the value the
/// caller supplies — the same direction every `set_raw_parameter`-style
/// call in the source language takes (Python's own dynamic typing picks
/// the branch from the passed-in value, not a schema lookup).
pub fn set_raw_parameter(model: &mut NLPModel, name: &str, value: AttrValue) -> ModelResult<()> {
    let entry = match value {
        AttrValue::Int(i) => crate::config::RawOptionValue::Int(i as i32),
        AttrValue::Float(f) => crate::config::RawOptionValue::Num(f),
        AttrValue::Str(s) => crate::config::RawOptionValue::Str(s),
        AttrValue::Bool(b) => crate::config::RawOptionValue::Int(b as i32),
        other => return Err(ModelError::UserError(format!("unsupported raw parameter value: {other:?}"))),
    };
    model.options.raw_options.retain(|(n, _)| n != name);
    model.options.raw_options.push((name.to_string(), entry));
    Ok(())
}

/// Picks the JIT back-end; not part of the §6 attribute table proper
/// (it has no source-language analogue — `algform`'s own addition), but
/// lives alongside the rest of the typed model-configuration surface.
pub fn set_jit_backend(model: &mut NLPModel, backend: JitBackend) {
    model.options.jit_backend = backend;
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::Domain;

    #[test]
    fn reduced_cost_reads_zero_before_any_solve() {
        let mut model = NLPModel::new();
        let v = model.add_variable(0.0, 1.0, Domain::Continuous, 0.0, "x");
        let got = get_variable_attribute(&model, v, VariableAttribute::ReducedCost).unwrap();
        assert_eq!(got.as_float().unwrap(), 0.0);
    }

    #[test]
    fn set_then_get_variable_bounds_round_trips() {
        let mut model = NLPModel::new();
        let v = model.add_variable(0.0, 1.0, Domain::Continuous, 0.0, "x");
        set_variable_attribute(&mut model, v, VariableAttribute::UpperBound, AttrValue::Float(5.0)).unwrap();
        let got = get_variable_attribute(&model, v, VariableAttribute::UpperBound).unwrap();
        assert_eq!(got.as_float().unwrap(), 5.0);
    }

    #[test]
    fn setting_value_attribute_has_no_entry_and_errors() {
        let mut model = NLPModel::new();
        let v = model.add_variable(0.0, 1.0, Domain::Continuous, 0.0, "x");
        let err = set_variable_attribute(&mut model, v, VariableAttribute::Value, AttrValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, ModelError::UserError(_)));
    }

    #[test]
    fn iis_constraint_attribute_is_unsupported() {
        let mut model = NLPModel::new();
        let x = model.add_variable(0.0, 1.0, Domain::Continuous, 0.0, "x");
        let saf = algform_core::ScalarAffineFunction::from_var(x);
        let cc: algform_core::ComparisonConstraint = algform_core::ExprBuilder::from(saf).leq(1.0);
        let h = model.add_linear_constraint(cc, "c0").unwrap();
        let err = get_constraint_attribute(&model, h, ConstraintAttribute::Iis).unwrap_err();
        assert!(matches!(err, ModelError::UserError(_)));
    }

    #[test]
    fn model_attribute_silent_round_trips_through_options() {
        let mut model = NLPModel::new();
        set_model_attribute(&mut model, ModelAttribute::Silent, AttrValue::Bool(true)).unwrap();
        let got = get_model_attribute(&model, ModelAttribute::Silent).unwrap();
        assert!(got.as_bool().unwrap());
    }
}
