//! Reference interpreter for [`NLGraph`], used by tests (and the autodiff
//! crate's central-difference checks) as the ground truth that compiled
//! code must match. Not on the hot solve path — `algform-codegen`/
//! `algform-jit` exist precisely so the real evaluation loop never goes
//! through a tree-walking interpreter.

use crate::graph::{BinaryOp, NLGraph, NaryOp, Node, NodeId, TernaryOp, UnaryOp};

fn eval_unary(op: UnaryOp, a: f64) -> f64 {
    match op {
        UnaryOp::Neg => -a,
        UnaryOp::Abs => a.abs(),
        UnaryOp::Sign => {
            if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        UnaryOp::Acos => a.acos(),
        UnaryOp::Acosh => a.acosh(),
        UnaryOp::Asin => a.asin(),
        UnaryOp::Asinh => a.asinh(),
        UnaryOp::Atan => a.atan(),
        UnaryOp::Atanh => a.atanh(),
        UnaryOp::Cos => a.cos(),
        UnaryOp::Cosh => a.cosh(),
        UnaryOp::Erf => erf(a),
        UnaryOp::Erfc => 1.0 - erf(a),
        UnaryOp::Exp => a.exp(),
        UnaryOp::Expm1 => a.exp_m1(),
        UnaryOp::Log => a.ln(),
        UnaryOp::Log10 => a.log10(),
        UnaryOp::Log1p => a.ln_1p(),
        UnaryOp::Sin => a.sin(),
        UnaryOp::Sinh => a.sinh(),
        UnaryOp::Sqrt => a.sqrt(),
        UnaryOp::Tan => a.tan(),
        UnaryOp::Tanh => a.tanh(),
    }
}

/// Abramowitz-Stegun rational approximation; good enough for test-suite
/// central-difference comparisons, not meant for production precision.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

fn eval_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq => bool_to_f64(a == b),
        BinaryOp::Ne => bool_to_f64(a != b),
        BinaryOp::Lt => bool_to_f64(a < b),
        BinaryOp::Le => bool_to_f64(a <= b),
        BinaryOp::Gt => bool_to_f64(a > b),
        BinaryOp::Ge => bool_to_f64(a >= b),
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Evaluates every node of `graph` at the given dense `x` (indexed by
/// variable slot, i.e. position in [`NLGraph::variables`]) and `p`
/// (indexed by parameter slot), returning the values requested by `roots`
/// in order.
pub fn eval_roots(graph: &NLGraph, x: &[f64], p: &[f64], roots: &[NodeId]) -> Vec<f64> {
    let mut values = vec![0.0f64; graph.len()];
    for i in 0..graph.len() {
        let id = NodeId(i as u32);
        values[i] = match graph.node(id) {
            Node::Constant(c) => *c,
            Node::Variable(v) => {
                let slot = graph
                    .variables()
                    .iter()
                    .position(|&vv| vv == *v)
                    .expect("variable node must have a registered slot");
                x[slot]
            }
            Node::Parameter(slot) => p[*slot],
            Node::Unary(op, a) => eval_unary(*op, values[a.0 as usize]),
            Node::Binary(op, a, b) => {
                eval_binary(*op, values[a.0 as usize], values[b.0 as usize])
            }
            Node::Ternary(TernaryOp::IfThenElse, c, t, e) => {
                if values[c.0 as usize] != 0.0 {
                    values[t.0 as usize]
                } else {
                    values[e.0 as usize]
                }
            }
            Node::Nary(NaryOp::Add, children) => {
                children.iter().map(|c| values[c.0 as usize]).sum()
            }
            Node::Nary(NaryOp::Mul, children) => {
                children.iter().map(|c| values[c.0 as usize]).product()
            }
        };
    }
    roots.iter().map(|&id| values[id.0 as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;

    #[test]
    fn evaluates_simple_polynomial() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let two = g.add_constant(2.0);
        let x2 = g.pow(x, two);
        let three = g.add_constant(3.0);
        let root = g.add(x2, three);
        let got = eval_roots(&g, &[4.0], &[], &[root]);
        assert!((got[0] - 19.0).abs() < 1e-12);
    }

    #[test]
    fn evaluates_ifelse_by_active_branch() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let zero = g.add_constant(0.0);
        let cond = g.comparison(BinaryOp::Gt, x, zero);
        let one = g.add_constant(1.0);
        let neg_one = g.add_constant(-1.0);
        let root = g.ifelse(cond, one, neg_one);
        assert_eq!(eval_roots(&g, &[5.0], &[], &[root]), vec![1.0]);
        assert_eq!(eval_roots(&g, &[-5.0], &[], &[root]), vec![-1.0]);
    }
}
