//! Rewrites constraint kinds the wired-up NLP back-end (IPOPT) cannot
//! solve natively into forms it can, the way
//! `original_source/.../constraint_bridge.py`'s
//! `bridge_soc_quadratic_constraint` rewrites a second-order cone into a
//! quadratic inequality before it ever reaches the solver's own API.
//!
//! IPOPT is a continuous interior-point NLP solver: it has no native
//! notion of a cone or an SOS set. Two of the §3 constraint kinds bridge
//! cleanly into constraints IPOPT already solves (`SecondOrderCone` into
//! a quadratic inequality, `ExponentialCone` into a smooth NL
//! inequality); the other two (`SOS1`, `SOS2`) are branch-and-bound
//! constructs with no continuous relaxation that preserves their
//! semantics, and this model does not carry a MIP back-end (see
//! Non-goals in SPEC_FULL.md), so they are rejected with a `UserError`
//! naming the missing capability rather than silently solved wrong.

pub use crate::model::ConstraintKind;
use crate::error::{ModelError, ModelResult};
use crate::model::{ConstraintHandle, NLPModel};
use algform_core::VarIdx;
use algform_graph::GraphHandle;

/// `x[0] >= sqrt(x[1]^2 + ... + x[n-1]^2)` rewritten as
/// `x[0]^2 - x[1]^2 - ... - x[n-1]^2 >= 0` (plus the solver-level bound
/// `x[0] >= 0`, which the caller must also set on `cone_variables[0]` —
/// the quadratic form alone admits `x[0] <= 0` too).
pub fn add_second_order_cone_constraint(
    model: &mut NLPModel,
    cone_variables: &[VarIdx],
    name: impl Into<String>,
) -> ModelResult<ConstraintHandle> {
    if cone_variables.len() < 2 {
        return Err(ModelError::UserError(
            "second-order cone constraint must have at least two variables".to_string(),
        ));
    }
    let mut builder = algform_core::ExprBuilder::new();
    let x0 = cone_variables[0];
    builder.add_quadratic_term(1.0, x0, x0);
    for &xi in &cone_variables[1..] {
        builder.add_quadratic_term(-1.0, xi, xi);
    }
    model.add_quadratic_constraint_kind(builder.geq(0.0), ConstraintKind::SecondOrderCone, name)
}

/// `2 * x[0] * x[1] >= x[2]^2 + ... + x[n-1]^2` rewritten as
/// `2*x[0]*x[1] - x[2]^2 - ... - x[n-1]^2 >= 0`.
pub fn add_rotated_second_order_cone_constraint(
    model: &mut NLPModel,
    cone_variables: &[VarIdx],
    name: impl Into<String>,
) -> ModelResult<ConstraintHandle> {
    if cone_variables.len() < 2 {
        return Err(ModelError::UserError(
            "rotated second-order cone constraint must have at least two variables".to_string(),
        ));
    }
    let mut builder = algform_core::ExprBuilder::new();
    let x0 = cone_variables[0];
    let x1 = cone_variables[1];
    builder.add_quadratic_term(2.0, x0, x1);
    for &xi in &cone_variables[2..] {
        builder.add_quadratic_term(-1.0, xi, xi);
    }
    model.add_quadratic_constraint_kind(builder.geq(0.0), ConstraintKind::SecondOrderCone, name)
}

/// `y * exp(x / y) <= z`, `y > 0` — the standard three-variable
/// exponential cone, rewritten as a single smooth NL inequality
/// `y * exp(x / y) - z <= 0` recorded in its own private graph. The
/// caller is responsible for the side bound `y > 0` (a `Continuous`
/// variable with `lb` set above `0.0`); the cone itself does not imply
/// it syntactically the way the quadratic cone rewrite implies `x0`'s
/// sign only through the inequality it produces.
pub fn add_exponential_cone_constraint(
    model: &mut NLPModel,
    x: VarIdx,
    y: VarIdx,
    z: VarIdx,
    name: impl Into<String>,
) -> ModelResult<ConstraintHandle> {
    let graph = GraphHandle::new();
    let root = graph.with_graph(|g| {
        let xn = g.add_variable(x);
        let yn = g.add_variable(y);
        let zn = g.add_variable(z);
        let ratio = g.div(xn, yn);
        let exp_ratio = g.unary(algform_graph::UnaryOp::Exp, ratio);
        let y_exp = g.mul(yn, exp_ratio);
        g.sub(y_exp, zn)
    });
    model.add_nl_constraint_kind(&graph, root, Vec::new(), ConstraintKind::ExponentialCone, f64::NEG_INFINITY, 0.0, name)
}

/// SOS1/SOS2 sets are a branch-and-bound construct (§1 Non-goals: "we do
/// not implement ... branch-and-bound"); this adapter only drives a
/// continuous interior-point back-end, so there is no sound rewrite.
/// Always returns `UserError`.
pub fn add_sos1_constraint(_model: &mut NLPModel, _variables: &[VarIdx], _weights: &[f64]) -> ModelResult<ConstraintHandle> {
    Err(ModelError::UserError(
        "SOS1 constraints require a mixed-integer back-end; none is wired into this adapter".to_string(),
    ))
}

/// See [`add_sos1_constraint`].
pub fn add_sos2_constraint(_model: &mut NLPModel, _variables: &[VarIdx], _weights: &[f64]) -> ModelResult<ConstraintHandle> {
    Err(ModelError::UserError(
        "SOS2 constraints require a mixed-integer back-end; none is wired into this adapter".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::Domain;

    #[test]
    fn soc_constraint_has_right_kind_and_shape() {
        let mut model = NLPModel::new();
        let x0 = model.add_variable(0.0, 100.0, Domain::Continuous, 1.0, "x0");
        let x1 = model.add_variable(-100.0, 100.0, Domain::Continuous, 1.0, "x1");
        let x2 = model.add_variable(-100.0, 100.0, Domain::Continuous, 1.0, "x2");
        let h = add_second_order_cone_constraint(&mut model, &[x0, x1, x2], "soc").unwrap();
        assert!(matches!(model.constraint_kind(h), ConstraintKind::SecondOrderCone));
        let (lb, ub) = model.constraint_bounds(h);
        assert_eq!(lb, 0.0);
        assert_eq!(ub, f64::INFINITY);
    }

    #[test]
    fn soc_rejects_too_few_variables() {
        let mut model = NLPModel::new();
        let x0 = model.add_variable(0.0, 10.0, Domain::Continuous, 1.0, "x0");
        let err = add_second_order_cone_constraint(&mut model, &[x0], "soc").unwrap_err();
        assert!(matches!(err, ModelError::UserError(_)));
    }

    #[test]
    fn sos_is_not_supported() {
        let mut model = NLPModel::new();
        let x0 = model.add_variable(0.0, 10.0, Domain::Continuous, 1.0, "x0");
        let x1 = model.add_variable(0.0, 10.0, Domain::Continuous, 1.0, "x1");
        let err = add_sos1_constraint(&mut model, &[x0, x1], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ModelError::UserError(_)));
    }

    #[test]
    fn exponential_cone_constraint_has_right_kind() {
        let mut model = NLPModel::new();
        let x = model.add_variable(f64::NEG_INFINITY, f64::INFINITY, Domain::Continuous, 0.0, "x");
        let y = model.add_variable(1e-6, f64::INFINITY, Domain::Continuous, 1.0, "y");
        let z = model.add_variable(f64::NEG_INFINITY, f64::INFINITY, Domain::Continuous, 1.0, "z");
        let h = add_exponential_cone_constraint(&mut model, x, y, z, "expcone").unwrap();
        assert!(matches!(model.constraint_kind(h), ConstraintKind::ExponentialCone));
    }
}
