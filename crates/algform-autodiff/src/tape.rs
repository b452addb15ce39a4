//! Reverse-mode differentiation by source transformation: each pass walks
//! an [`NLGraph`] in descending node-id order (valid since the arena is
//! append-only, so every node's children have a strictly smaller id) and
//! *builds new nodes* expressing the local derivative, rather than
//! producing numbers. Running the same transform a second time over the
//! first pass's output graph gives the Hessian without a separate
//! second-order rule for every op — the conceptual move grounded on
//! `examples/original_source/.../tracefun.py`'s CppAD-style taping, re-expressed
//! here as pure graph-to-graph transformation since CppAD's own tape
//! format has no Rust binding in this workspace and our compiled targets
//! (C text, LLVM IR) need graphs, not a replayable tape.
//!
//! Sparsity (`jac_rows`/`jac_cols`, `hess_rows`/`hess_cols`) is purely
//! structural: an entry is included the moment some edge of the reverse
//! sweep reaches it, never because a numeric probe happened to be
//! nonzero.

use crate::error::{AutodiffError, AutodiffResult};
use algform_graph::{BinaryOp, NLGraph, NaryOp, Node, NodeId, TernaryOp, UnaryOp};
use std::collections::HashMap;

/// The three new graphs produced by differentiating one representative,
/// plus the sparsity/shape metadata a solver adapter needs to size its
/// IPOPT callback buffers.
#[derive(Debug, Clone)]
pub struct AutodiffArtifact {
    /// Same node alphabet and outputs as the input graph; kept as its own
    /// graph (rather than reusing the caller's) so codegen can compile it
    /// independently of the derivative graphs.
    pub f_graph: NLGraph,
    /// Outputs are the `nnz_jac` structurally nonzero Jacobian entries, in
    /// the order of `structure.jac_rows`/`jac_cols`.
    pub jacobian_graph: NLGraph,
    /// Outputs are the `nnz_hess` structurally nonzero lower-triangular
    /// Hessian-of-the-Lagrangian entries, in the order of
    /// `structure.hess_rows`/`hess_cols`. Takes one multiplier per output
    /// of the original graph (`nw == ny`), addressed as parameter slots
    /// `[np, np + ny)` immediately following the real parameters.
    pub hessian_graph: NLGraph,
    pub structure: AutodiffStructure,
}

#[derive(Debug, Clone)]
pub struct AutodiffStructure {
    pub nx: usize,
    pub np: usize,
    pub ny: usize,
    pub nnz_jac: usize,
    pub nnz_hess: usize,
    pub jac_rows: Vec<usize>,
    pub jac_cols: Vec<usize>,
    pub hess_rows: Vec<usize>,
    pub hess_cols: Vec<usize>,
    pub has_jacobian: bool,
    pub has_hessian: bool,
    pub has_parameter: bool,
}

/// Copies every node of `src` into `dst` in order, returning the
/// src-id -> dst-id mapping. Variable/parameter nodes go through
/// `dst.add_variable`/`add_parameter` so slot order matches `src`'s
/// first-seen order.
fn copy_subgraph(src: &NLGraph, dst: &mut NLGraph) -> Vec<NodeId> {
    let mut map: Vec<NodeId> = Vec::with_capacity(src.len());
    for i in 0..src.len() {
        let id = NodeId(i as u32);
        let at = |m: &[NodeId], n: NodeId| m[n.0 as usize];
        let new_id = match src.node(id).clone() {
            Node::Constant(c) => dst.add_constant(c),
            Node::Variable(v) => dst.add_variable(v),
            Node::Parameter(slot) => dst.add_parameter(slot),
            Node::Unary(op, a) => dst.unary(op, at(&map, a)),
            Node::Binary(op, a, b) => match op {
                BinaryOp::Add => dst.add(at(&map, a), at(&map, b)),
                BinaryOp::Sub => dst.sub(at(&map, a), at(&map, b)),
                BinaryOp::Mul => dst.mul(at(&map, a), at(&map, b)),
                BinaryOp::Div => dst.div(at(&map, a), at(&map, b)),
                BinaryOp::Pow => dst.pow(at(&map, a), at(&map, b)),
                cmp => dst.comparison(cmp, at(&map, a), at(&map, b)),
            },
            Node::Ternary(TernaryOp::IfThenElse, c, t, e) => {
                dst.ifelse(at(&map, c), at(&map, t), at(&map, e))
            }
            Node::Nary(op, children) => {
                let mapped: Vec<NodeId> = children.iter().map(|&c| at(&map, c)).collect();
                let mut it = mapped.into_iter();
                let first = it.next();
                match (op, first) {
                    (NaryOp::Add, Some(first)) => it.fold(first, |acc, n| dst.add(acc, n)),
                    (NaryOp::Mul, Some(first)) => it.fold(first, |acc, n| dst.mul(acc, n)),
                    (NaryOp::Add, None) => dst.add_constant(0.0),
                    (NaryOp::Mul, None) => dst.add_constant(1.0),
                }
            }
        };
        map.push(new_id);
    }
    map
}

fn accumulate(dst: &mut NLGraph, adjoints: &mut HashMap<u32, NodeId>, target: NodeId, contribution: NodeId) {
    match adjoints.get(&target.0).copied() {
        Some(existing) => {
            let sum = dst.add(existing, contribution);
            adjoints.insert(target.0, sum);
        }
        None => {
            adjoints.insert(target.0, contribution);
        }
    }
}

fn unary_adjoint(dst: &mut NLGraph, op: UnaryOp, a: NodeId, id: NodeId, adj: NodeId) -> NodeId {
    match op {
        UnaryOp::Neg => dst.neg(adj),
        UnaryOp::Abs => {
            let s = dst.unary(UnaryOp::Sign, a);
            dst.mul(s, adj)
        }
        UnaryOp::Sign => dst.add_constant(0.0),
        UnaryOp::Acos => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let one_minus = dst.sub(one, a2);
            let sq = dst.unary(UnaryOp::Sqrt, one_minus);
            let div = dst.div(adj, sq);
            dst.neg(div)
        }
        UnaryOp::Acosh => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let a2m1 = dst.sub(a2, one);
            let sq = dst.unary(UnaryOp::Sqrt, a2m1);
            dst.div(adj, sq)
        }
        UnaryOp::Asin => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let one_minus = dst.sub(one, a2);
            let sq = dst.unary(UnaryOp::Sqrt, one_minus);
            dst.div(adj, sq)
        }
        UnaryOp::Asinh => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let a2p1 = dst.add(a2, one);
            let sq = dst.unary(UnaryOp::Sqrt, a2p1);
            dst.div(adj, sq)
        }
        UnaryOp::Atan => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let denom = dst.add(one, a2);
            dst.div(adj, denom)
        }
        UnaryOp::Atanh => {
            let a2 = dst.mul(a, a);
            let one = dst.add_constant(1.0);
            let denom = dst.sub(one, a2);
            dst.div(adj, denom)
        }
        UnaryOp::Cos => {
            let s = dst.unary(UnaryOp::Sin, a);
            let neg_s = dst.neg(s);
            dst.mul(neg_s, adj)
        }
        UnaryOp::Cosh => {
            let s = dst.unary(UnaryOp::Sinh, a);
            dst.mul(s, adj)
        }
        UnaryOp::Erf | UnaryOp::Erfc => {
            let a2 = dst.mul(a, a);
            let neg_a2 = dst.neg(a2);
            let e = dst.unary(UnaryOp::Exp, neg_a2);
            let c = dst.add_constant(2.0 / std::f64::consts::PI.sqrt());
            let coeff = dst.mul(c, e);
            let d = dst.mul(coeff, adj);
            if matches!(op, UnaryOp::Erfc) {
                dst.neg(d)
            } else {
                d
            }
        }
        UnaryOp::Exp => dst.mul(id, adj),
        UnaryOp::Expm1 => {
            let e = dst.unary(UnaryOp::Exp, a);
            dst.mul(e, adj)
        }
        UnaryOp::Log => dst.div(adj, a),
        UnaryOp::Log10 => {
            let ln10 = dst.add_constant(std::f64::consts::LN_10);
            let denom = dst.mul(a, ln10);
            dst.div(adj, denom)
        }
        UnaryOp::Log1p => {
            let one = dst.add_constant(1.0);
            let denom = dst.add(one, a);
            dst.div(adj, denom)
        }
        UnaryOp::Sin => {
            let c = dst.unary(UnaryOp::Cos, a);
            dst.mul(c, adj)
        }
        UnaryOp::Sinh => {
            let c = dst.unary(UnaryOp::Cosh, a);
            dst.mul(c, adj)
        }
        UnaryOp::Sqrt => {
            let two = dst.add_constant(2.0);
            let denom = dst.mul(two, id);
            dst.div(adj, denom)
        }
        UnaryOp::Tan => {
            let t2 = dst.mul(id, id);
            let one = dst.add_constant(1.0);
            let factor = dst.add(one, t2);
            dst.mul(factor, adj)
        }
        UnaryOp::Tanh => {
            let t2 = dst.mul(id, id);
            let one = dst.add_constant(1.0);
            let factor = dst.sub(one, t2);
            dst.mul(factor, adj)
        }
    }
}

/// One reverse sweep over `dst`, differentiating the (possibly weighted,
/// possibly multi-root) combination given by `seed_roots` with respect to
/// every node reachable at id `<= max_id`. Returns the accumulated
/// adjoint per node id touched; a node with no entry has zero adjoint.
/// Nodes created by this sweep itself (ids `> max_id`) are never visited,
/// which is what keeps one sweep from re-differentiating its own output.
fn reverse_pass(dst: &mut NLGraph, max_id: u32, seed_roots: &[(NodeId, NodeId)]) -> HashMap<u32, NodeId> {
    let mut adjoints: HashMap<u32, NodeId> = HashMap::new();
    for &(root, seed) in seed_roots {
        accumulate(dst, &mut adjoints, root, seed);
    }
    for raw_id in (0..=max_id).rev() {
        let id = NodeId(raw_id);
        let adj = match adjoints.get(&raw_id).copied() {
            Some(a) => a,
            None => continue,
        };
        match dst.node(id).clone() {
            Node::Constant(_) | Node::Variable(_) | Node::Parameter(_) => {}
            Node::Unary(op, a) => {
                let da = unary_adjoint(dst, op, a, id, adj);
                accumulate(dst, &mut adjoints, a, da);
            }
            Node::Binary(op, a, b) => match op {
                BinaryOp::Add => {
                    accumulate(dst, &mut adjoints, a, adj);
                    accumulate(dst, &mut adjoints, b, adj);
                }
                BinaryOp::Sub => {
                    accumulate(dst, &mut adjoints, a, adj);
                    let neg = dst.neg(adj);
                    accumulate(dst, &mut adjoints, b, neg);
                }
                BinaryOp::Mul => {
                    let da = dst.mul(b, adj);
                    let db = dst.mul(a, adj);
                    accumulate(dst, &mut adjoints, a, da);
                    accumulate(dst, &mut adjoints, b, db);
                }
                BinaryOp::Div => {
                    let da = dst.div(adj, b);
                    let id_over_b = dst.div(id, b);
                    let neg_id_over_b = dst.neg(id_over_b);
                    let db = dst.mul(neg_id_over_b, adj);
                    accumulate(dst, &mut adjoints, a, da);
                    accumulate(dst, &mut adjoints, b, db);
                }
                BinaryOp::Pow => {
                    let one = dst.add_constant(1.0);
                    let b_minus_1 = dst.sub(b, one);
                    let a_pow_bm1 = dst.pow(a, b_minus_1);
                    let b_times = dst.mul(b, a_pow_bm1);
                    let da = dst.mul(b_times, adj);
                    accumulate(dst, &mut adjoints, a, da);
                    let ln_a = dst.unary(UnaryOp::Log, a);
                    let id_ln_a = dst.mul(id, ln_a);
                    let db = dst.mul(id_ln_a, adj);
                    accumulate(dst, &mut adjoints, b, db);
                }
                BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {}
            },
            Node::Ternary(TernaryOp::IfThenElse, cond, then_, else_) => {
                let zero = dst.add_constant(0.0);
                let then_contrib = dst.ifelse(cond, adj, zero);
                let else_contrib = dst.ifelse(cond, zero, adj);
                accumulate(dst, &mut adjoints, then_, then_contrib);
                accumulate(dst, &mut adjoints, else_, else_contrib);
            }
            Node::Nary(NaryOp::Add, children) => {
                for c in children {
                    accumulate(dst, &mut adjoints, c, adj);
                }
            }
            Node::Nary(NaryOp::Mul, children) => {
                let n = children.len();
                let mut prefix = vec![dst.add_constant(1.0); n + 1];
                for i in 0..n {
                    prefix[i + 1] = dst.mul(prefix[i], children[i]);
                }
                let mut suffix = vec![dst.add_constant(1.0); n + 1];
                for i in (0..n).rev() {
                    suffix[i] = dst.mul(children[i], suffix[i + 1]);
                }
                for i in 0..n {
                    let others = dst.mul(prefix[i], suffix[i + 1]);
                    let contrib = dst.mul(others, adj);
                    accumulate(dst, &mut adjoints, children[i], contrib);
                }
            }
        }
    }
    adjoints
}

fn var_node_in(map: &[NodeId], src: &NLGraph, v: algform_core::VarIdx) -> NodeId {
    map[src
        .variable_node(v)
        .expect("variable came from src.variables(), must be registered")
        .0 as usize]
}

/// Differentiates `representative`'s constraint and objective outputs
/// (in that order, forming the function's output vector `y`) producing
/// `f_graph`/`jacobian_graph`/`hessian_graph` plus their sparsity.
pub fn differentiate(representative: &NLGraph) -> AutodiffResult<AutodiffArtifact> {
    let outputs: Vec<NodeId> = representative
        .constraint_outputs()
        .iter()
        .chain(representative.objective_outputs())
        .copied()
        .collect();
    if outputs.is_empty() {
        return Err(AutodiffError::EmptyOutputs);
    }

    let nx = representative.variables().len();
    let np = representative.n_parameters();
    let ny = outputs.len();
    let max_id = representative.len() as u32 - 1;

    let mut f_graph = NLGraph::new();
    let f_map = copy_subgraph(representative, &mut f_graph);
    for &out in representative.constraint_outputs() {
        f_graph.add_constraint_output(f_map[out.0 as usize]);
    }
    for &out in representative.objective_outputs() {
        f_graph.add_objective_output(f_map[out.0 as usize]);
    }

    let mut jac_graph = NLGraph::new();
    let jac_map = copy_subgraph(representative, &mut jac_graph);
    let mut jac_rows = Vec::new();
    let mut jac_cols = Vec::new();
    for (row, &out) in outputs.iter().enumerate() {
        let root = jac_map[out.0 as usize];
        let one = jac_graph.add_constant(1.0);
        let adjoints = reverse_pass(&mut jac_graph, max_id, &[(root, one)]);
        for (col, &v) in representative.variables().iter().enumerate() {
            let var_node = var_node_in(&jac_map, representative, v);
            if let Some(&a) = adjoints.get(&var_node.0) {
                jac_graph.add_objective_output(a);
                jac_rows.push(row);
                jac_cols.push(col);
            }
        }
    }
    let nnz_jac = jac_rows.len();

    let mut hess_graph = NLGraph::new();
    let hess_map = copy_subgraph(representative, &mut hess_graph);
    let w_nodes: Vec<NodeId> = (0..ny).map(|_| hess_graph.new_parameter()).collect();
    let lagrangian_seeds: Vec<(NodeId, NodeId)> = outputs
        .iter()
        .enumerate()
        .map(|(i, &out)| (hess_map[out.0 as usize], w_nodes[i]))
        .collect();
    let grad_adjoints = reverse_pass(&mut hess_graph, max_id, &lagrangian_seeds);

    let grad_nodes: Vec<NodeId> = representative
        .variables()
        .iter()
        .map(|&v| {
            let var_node = var_node_in(&hess_map, representative, v);
            grad_adjoints
                .get(&var_node.0)
                .copied()
                .unwrap_or_else(|| hess_graph.add_constant(0.0))
        })
        .collect();

    let mut hess_rows = Vec::new();
    let mut hess_cols = Vec::new();
    let max_id_after_grad = hess_graph.len() as u32 - 1;
    for (k, &gk) in grad_nodes.iter().enumerate() {
        let one = hess_graph.add_constant(1.0);
        let second_adjoints = reverse_pass(&mut hess_graph, max_id_after_grad, &[(gk, one)]);
        for l in 0..=k {
            let v = representative.variables()[l];
            let var_node = var_node_in(&hess_map, representative, v);
            if let Some(&a) = second_adjoints.get(&var_node.0) {
                hess_graph.add_objective_output(a);
                hess_rows.push(k);
                hess_cols.push(l);
            }
        }
    }
    let nnz_hess = hess_rows.len();

    let structure = AutodiffStructure {
        nx,
        np,
        ny,
        nnz_jac,
        nnz_hess,
        jac_rows,
        jac_cols,
        hess_rows,
        hess_cols,
        has_jacobian: nnz_jac > 0,
        has_hessian: nnz_hess > 0,
        has_parameter: np > 0,
    };

    Ok(AutodiffArtifact {
        f_graph,
        jacobian_graph: jac_graph,
        hessian_graph: hess_graph,
        structure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;
    use algform_graph::eval_roots;

    fn central_difference(f: impl Fn(&[f64]) -> f64, x: &[f64], i: usize, h: f64) -> f64 {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        (f(&xp) - f(&xm)) / (2.0 * h)
    }

    #[test]
    fn jacobian_of_quadratic_matches_central_difference() {
        // f(x0, x1) = x0^2 * x1 + sin(x1)
        let mut g = NLGraph::new();
        let x0 = g.add_variable(VarIdx::new(0));
        let x1 = g.add_variable(VarIdx::new(1));
        let x0_sq = g.mul(x0, x0);
        let term1 = g.mul(x0_sq, x1);
        let s = g.unary(UnaryOp::Sin, x1);
        let root = g.add(term1, s);
        g.add_objective_output(root);

        let artifact = differentiate(&g).unwrap();
        assert_eq!(artifact.structure.nx, 2);
        assert_eq!(artifact.structure.ny, 1);
        assert!(artifact.structure.has_jacobian);

        let x = [1.3, 0.7];
        let jac_outputs = artifact.jacobian_graph.objective_outputs();
        let values = eval_roots(&artifact.jacobian_graph, &x, &[], jac_outputs);

        let f = |xv: &[f64]| xv[0] * xv[0] * xv[1] + xv[1].sin();
        for (i, &(_, col)) in artifact
            .structure
            .jac_rows
            .iter()
            .zip(&artifact.structure.jac_cols)
            .enumerate()
            .map(|(i, (r, c))| (i, (*r, *c)))
        {
            let expected = central_difference(f, &x, col, 1e-6);
            assert!((values[i] - expected).abs() < 1e-4, "jac[{col}] = {}, expected {expected}", values[i]);
        }
    }

    #[test]
    fn hessian_of_quadratic_matches_central_difference() {
        // f(x0, x1) = x0^2 * x1
        let mut g = NLGraph::new();
        let x0 = g.add_variable(VarIdx::new(0));
        let x1 = g.add_variable(VarIdx::new(1));
        let x0_sq = g.mul(x0, x0);
        let root = g.mul(x0_sq, x1);
        g.add_objective_output(root);

        let artifact = differentiate(&g).unwrap();
        assert!(artifact.structure.has_hessian);

        let x = [1.3, 0.7];
        let w = [1.0];
        let mut p_and_w = Vec::new();
        p_and_w.extend_from_slice(&w);
        let hess_outputs = artifact.hessian_graph.objective_outputs();
        let values = eval_roots(&artifact.hessian_graph, &x, &p_and_w, hess_outputs);

        // d2f/dx0^2 = 2*x1, d2f/dx0dx1 = 2*x0, d2f/dx1^2 = 0 (absent, structurally pruned is not expected here but allowed)
        let expected_full = [[2.0 * x[1], 2.0 * x[0]], [2.0 * x[0], 0.0]];
        for (i, (&row, &col)) in artifact
            .structure
            .hess_rows
            .iter()
            .zip(&artifact.structure.hess_cols)
            .enumerate()
        {
            let expected = expected_full[row][col];
            assert!(
                (values[i] - expected).abs() < 1e-6,
                "hess[{row}][{col}] = {}, expected {expected}",
                values[i]
            );
        }
    }

    #[test]
    fn empty_graph_is_an_error() {
        let g = NLGraph::new();
        assert!(matches!(differentiate(&g), Err(AutodiffError::EmptyOutputs)));
    }
}
