//! End-to-end modeling + solve scenarios exercising the full build →
//! group → differentiate → codegen → JIT → IPOPT pipeline through the
//! `algform` facade.

use algform::{Domain, GraphHandle, ModelError, NLPModel, ObjectiveSense, UnaryOp};

fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{what}: expected {expected}, got {actual} (tol {tol})"
    );
}

/// §8 scenario 1: `min x^2 + y^2` s.t. `x + y >= 10`, `x in [0,20]`,
/// `y in [8,20]`. Optimal at `x=2, y=8, obj=68`.
#[test]
fn tiny_qp_matches_literal_expected_output() -> Result<(), ModelError> {
    let mut model = NLPModel::new();
    let x = model.add_variable(0.0, 20.0, Domain::Continuous, 1.0, "x");
    let y = model.add_variable(8.0, 20.0, Domain::Continuous, 9.0, "y");

    let x_sq = (x * x)?;
    let y_sq = (y * y)?;
    model.set_objective(x_sq + y_sq)?;

    let cc = (x + y).geq(10.0);
    model.add_linear_constraint(cc, "sum_ge_10")?;

    model.optimize()?;

    assert_close(model.variable_value(x), 2.0, 1e-4, "x");
    assert_close(model.variable_value(y), 8.0, 1e-4, "y");
    assert_close(model.objective_value(), 68.0, 1e-4, "objective");
    Ok(())
}

/// §8 scenario 3: Hock-Schittkowski problem 71 — `min x1*x4*(x1+x2+x3)+x3`
/// s.t. `x1*x2*x3*x4 >= 25`, `x1^2+x2^2+x3^2+x4^2 = 40`, `xi in [1,5]`.
/// Drives multiplication past degree 2, so every term is recorded through
/// an explicit [`GraphHandle`] instead of `ExprBuilder` algebra.
#[test]
fn hs071_matches_known_optimum() -> Result<(), ModelError> {
    let mut model = NLPModel::new();
    let starts = [1.0, 5.0, 5.0, 1.0];
    let x1 = model.add_variable(1.0, 5.0, Domain::Continuous, starts[0], "x1");
    let x2 = model.add_variable(1.0, 5.0, Domain::Continuous, starts[1], "x2");
    let x3 = model.add_variable(1.0, 5.0, Domain::Continuous, starts[2], "x3");
    let x4 = model.add_variable(1.0, 5.0, Domain::Continuous, starts[3], "x4");

    let g_obj = GraphHandle::new();
    let root_obj = g_obj.with_graph(|g| {
        let n1 = g.add_variable(x1);
        let n2 = g.add_variable(x2);
        let n3 = g.add_variable(x3);
        let n4 = g.add_variable(x4);
        let s12 = g.add(n1, n2);
        let s123 = g.add(s12, n3);
        let x1x4 = g.mul(n1, n4);
        let term1 = g.mul(x1x4, s123);
        g.add(term1, n3)
    });
    model.add_nl_objective(&g_obj, root_obj, Vec::new())?;

    let g_c1 = GraphHandle::new();
    let root_c1 = g_c1.with_graph(|g| {
        let n1 = g.add_variable(x1);
        let n2 = g.add_variable(x2);
        let n3 = g.add_variable(x3);
        let n4 = g.add_variable(x4);
        let p12 = g.mul(n1, n2);
        let p123 = g.mul(p12, n3);
        g.mul(p123, n4)
    });
    model.add_nl_constraint(&g_c1, root_c1, Vec::new(), 25.0, f64::INFINITY, "product_ge_25")?;

    let g_c2 = GraphHandle::new();
    let root_c2 = g_c2.with_graph(|g| {
        let n1 = g.add_variable(x1);
        let n2 = g.add_variable(x2);
        let n3 = g.add_variable(x3);
        let n4 = g.add_variable(x4);
        let x1sq = g.mul(n1, n1);
        let x2sq = g.mul(n2, n2);
        let x3sq = g.mul(n3, n3);
        let x4sq = g.mul(n4, n4);
        let s12 = g.add(x1sq, x2sq);
        let s34 = g.add(x3sq, x4sq);
        g.add(s12, s34)
    });
    model.add_nl_constraint(&g_c2, root_c2, Vec::new(), 40.0, 40.0, "sum_sq_eq_40")?;

    model.optimize()?;

    assert_close(model.objective_value(), 17.014017, 1e-3, "objective");
    assert_close(model.variable_value(x1), 1.0, 1e-2, "x1");
    assert_close(model.variable_value(x2), 4.743, 1e-2, "x2");
    assert_close(model.variable_value(x3), 3.821, 1e-2, "x3");
    assert_close(model.variable_value(x4), 1.379, 1e-2, "x4");
    Ok(())
}

/// §8 scenario 6: register `f(x; p) = x*(p+1)^2` once per instance with a
/// distinct parameter value, constrain `f_i(x_i) >= 1`, and maximize
/// `-sum(exp(x_i))` (equivalently minimize `sum(exp(x_i))`, §8 phrases it
/// as minimizing `exp(x_i)` while *maximizing* feasibility against a
/// tight constraint — the stated optimum has every constraint active).
/// Every instance is structurally identical up to its parameter and
/// variable binding, so `GraphGrouper` must fold all ten constraint
/// instances into a single compiled group.
#[test]
fn parametric_family_shares_one_compiled_group() -> Result<(), ModelError> {
    let mut model = NLPModel::new();
    model.set_objective_sense(ObjectiveSense::Minimize);

    let mut xs = Vec::new();
    for i in 0..10 {
        let x = model.add_variable(1e-6, 10.0, Domain::Continuous, 0.5, format!("x{i}"));
        xs.push(x);
    }

    for (i, &x) in xs.iter().enumerate() {
        let g = GraphHandle::new();
        let root = g.with_graph(|gr| {
            let xn = gr.add_variable(x);
            let pn = gr.new_parameter();
            let one = gr.add_constant(1.0);
            let p_plus_1 = gr.add(pn, one);
            let p_plus_1_sq = gr.mul(p_plus_1, p_plus_1);
            gr.mul(xn, p_plus_1_sq)
        });
        model.add_nl_constraint(&g, root, vec![i as f64], 1.0, f64::INFINITY, format!("c{i}"))?;

        let g_obj = GraphHandle::new();
        let root_obj = g_obj.with_graph(|gr| {
            let xn = gr.add_variable(x);
            gr.unary(UnaryOp::Exp, xn)
        });
        model.add_nl_objective(&g_obj, root_obj, Vec::new())?;
    }

    model.optimize()?;

    for (i, &x) in xs.iter().enumerate() {
        let expected = 1.0 / ((i + 1) as f64).powi(2);
        assert_close(model.variable_value(x), expected, 1e-4, &format!("x{i}"));
    }
    Ok(())
}
