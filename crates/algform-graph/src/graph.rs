//! The nonlinear expression-graph arena and its thread-local recording
//! context, grounded on
//! `examples/original_source/.../nlfunc.py`'s `ExpressionGraphContext`
//! (`_graph_stack` thread-local, `__enter__`/`__exit__`, `current_graph()`).

use crate::error::{GraphError, GraphResult};
use algform_core::{ExprBuilder, ScalarAffineFunction, ScalarQuadraticFunction, VarIdx};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A node id local to one [`NLGraph`]. Never meaningful across graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sign,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Cos,
    Cosh,
    Erf,
    Erfc,
    Exp,
    Expm1,
    Log,
    Log10,
    Log1p,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TernaryOp {
    IfThenElse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NaryOp {
    Add,
    Mul,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(f64),
    Variable(VarIdx),
    Parameter(usize),
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
    Ternary(TernaryOp, NodeId, NodeId, NodeId),
    Nary(NaryOp, Vec<NodeId>),
}

/// A directed acyclic computation graph. Nodes are addressed by position
/// in an append-only arena, so a node can only ever reference nodes
/// created before it — acyclicity is a structural invariant of
/// construction, not something checked after the fact.
#[derive(Debug, Clone, Default)]
pub struct NLGraph {
    nodes: Vec<Node>,
    variables: Vec<VarIdx>,
    var_node: HashMap<VarIdx, NodeId>,
    n_parameters: usize,
    param_node: HashMap<usize, NodeId>,
    constraint_outputs: Vec<NodeId>,
    objective_outputs: Vec<NodeId>,
}

impl NLGraph {
    pub fn new() -> Self {
        NLGraph::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.idx()]
    }

    /// The node recording a previously-folded variable, if any.
    pub fn variable_node(&self, v: VarIdx) -> Option<NodeId> {
        self.var_node.get(&v).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn variables(&self) -> &[VarIdx] {
        &self.variables
    }

    pub fn n_parameters(&self) -> usize {
        self.n_parameters
    }

    pub fn constraint_outputs(&self) -> &[NodeId] {
        &self.constraint_outputs
    }

    pub fn objective_outputs(&self) -> &[NodeId] {
        &self.objective_outputs
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId((self.nodes.len() - 1) as u32)
    }

    pub fn add_constant(&mut self, value: f64) -> NodeId {
        self.push(Node::Constant(value))
    }

    /// Folds an external variable into the graph, sharing the node (and
    /// its slot in `variables`) across repeated calls for the same
    /// variable (CSE).
    pub fn add_variable(&mut self, v: VarIdx) -> NodeId {
        if let Some(&id) = self.var_node.get(&v) {
            return id;
        }
        self.variables.push(v);
        let id = self.push(Node::Variable(v));
        self.var_node.insert(v, id);
        id
    }

    /// References an existing parameter slot (shared across calls for the
    /// same slot).
    pub fn add_parameter(&mut self, slot: usize) -> NodeId {
        if let Some(&id) = self.param_node.get(&slot) {
            return id;
        }
        self.n_parameters = self.n_parameters.max(slot + 1);
        let id = self.push(Node::Parameter(slot));
        self.param_node.insert(slot, id);
        id
    }

    /// Allocates a fresh parameter slot and returns its leaf node.
    pub fn new_parameter(&mut self) -> NodeId {
        let slot = self.n_parameters;
        self.add_parameter(slot)
    }

    pub fn unary(&mut self, op: UnaryOp, child: NodeId) -> NodeId {
        self.push(Node::Unary(op, child))
    }

    fn flatten_nary(&self, op: NaryOp, id: NodeId, into: &mut Vec<NodeId>) {
        match self.node(id) {
            Node::Nary(o, children) if *o == op => into.extend(children.iter().copied()),
            _ => into.push(id),
        }
    }

    /// `l + r`, collapsing into the same n-ary `Add` node when either
    /// operand already is one.
    pub fn add(&mut self, l: NodeId, r: NodeId) -> NodeId {
        let mut children = Vec::new();
        self.flatten_nary(NaryOp::Add, l, &mut children);
        self.flatten_nary(NaryOp::Add, r, &mut children);
        self.push(Node::Nary(NaryOp::Add, children))
    }

    /// `l * r`, collapsing into the same n-ary `Mul` node when either
    /// operand already is one.
    pub fn mul(&mut self, l: NodeId, r: NodeId) -> NodeId {
        let mut children = Vec::new();
        self.flatten_nary(NaryOp::Mul, l, &mut children);
        self.flatten_nary(NaryOp::Mul, r, &mut children);
        self.push(Node::Nary(NaryOp::Mul, children))
    }

    pub fn neg(&mut self, x: NodeId) -> NodeId {
        self.unary(UnaryOp::Neg, x)
    }

    pub fn sub(&mut self, l: NodeId, r: NodeId) -> NodeId {
        let neg_r = self.neg(r);
        self.add(l, neg_r)
    }

    pub fn div(&mut self, l: NodeId, r: NodeId) -> NodeId {
        self.push(Node::Binary(BinaryOp::Div, l, r))
    }

    pub fn pow(&mut self, base: NodeId, exponent: NodeId) -> NodeId {
        self.push(Node::Binary(BinaryOp::Pow, base, exponent))
    }

    pub fn comparison(&mut self, op: BinaryOp, l: NodeId, r: NodeId) -> NodeId {
        debug_assert!(matches!(
            op,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        ));
        self.push(Node::Binary(op, l, r))
    }

    /// `cond ? then_ : else_`. `cond` should be a node produced by
    /// [`comparison`](Self::comparison); this is documented, not enforced.
    pub fn ifelse(&mut self, cond: NodeId, then_: NodeId, else_: NodeId) -> NodeId {
        self.push(Node::Ternary(TernaryOp::IfThenElse, cond, then_, else_))
    }

    /// `x ** n` for integer `n`, lowered to repeated-squaring
    /// multiplications (`n >= 0`) or `1 / (x ** |n|)` (`n < 0`). This
    /// keeps the Hessian autodiff pass looking at structure-preserving
    /// polynomials instead of an opaque `pow(x, n as f64)` call.
    pub fn pow_int(&mut self, base: NodeId, n: i64) -> NodeId {
        if n < 0 {
            let positive = self.pow_int(base, -n);
            let one = self.add_constant(1.0);
            return self.div(one, positive);
        }
        if n == 0 {
            return self.add_constant(1.0);
        }
        self.pow_int_positive(base, n as u64)
    }

    fn pow_int_positive(&mut self, base: NodeId, n: u64) -> NodeId {
        if n == 1 {
            return base;
        }
        let half = self.pow_int_positive(base, n / 2);
        let squared = self.mul(half, half);
        if n % 2 == 1 {
            self.mul(squared, base)
        } else {
            squared
        }
    }

    /// Folds a [`ScalarAffineFunction`] into the graph as the equivalent
    /// sum-of-products subgraph.
    ///
    /// Every coefficient and the constant term become fresh `Parameter`
    /// leaves rather than baked `Constant` nodes: this expression is
    /// normally one instance of a group that will be compiled exactly
    /// once and reused by every structurally-isomorphic instance (see
    /// `algform-graph::hash`), so the numeric data that actually varies
    /// instance to instance — here, the coefficients — has to live in
    /// the `p` array the compiled function reads, not hardcoded into its
    /// body. Returns the root node alongside the newly-allocated
    /// parameter values in slot-allocation order, which the caller
    /// (typically the model layer) records as this instance's `p_vals`.
    pub fn fold_saf(&mut self, saf: &ScalarAffineFunction) -> (NodeId, Vec<f64>) {
        let mut param_values = Vec::new();
        let mut terms: Vec<NodeId> = Vec::with_capacity(saf.variables.len());
        for (&v, &c) in saf.variables.iter().zip(saf.coefficients.iter()) {
            let vn = self.add_variable(v);
            let cn = self.new_parameter();
            param_values.push(c);
            terms.push(self.mul(cn, vn));
        }
        let mut acc = match terms.split_first() {
            Some((&first, rest)) => {
                let mut acc = first;
                for &t in rest {
                    acc = self.add(acc, t);
                }
                acc
            }
            None => self.add_constant(0.0),
        };
        if saf.constant != 0.0 || saf.variables.is_empty() {
            let cn = self.new_parameter();
            param_values.push(saf.constant);
            acc = self.add(acc, cn);
        }
        (acc, param_values)
    }

    /// Folds a [`ScalarQuadraticFunction`] into the graph. See
    /// [`fold_saf`](Self::fold_saf) for why coefficients become
    /// parameters instead of constants.
    pub fn fold_sqf(&mut self, sqf: &ScalarQuadraticFunction) -> (NodeId, Vec<f64>) {
        let (affine, mut param_values) = self.fold_saf(&sqf.affine_part);
        let mut acc = affine;
        for ((&v1, &v2), &c) in sqf
            .variable_1s
            .iter()
            .zip(sqf.variable_2s.iter())
            .zip(sqf.coefficients.iter())
        {
            let n1 = self.add_variable(v1);
            let n2 = self.add_variable(v2);
            let cn = self.new_parameter();
            param_values.push(c);
            let prod = self.mul(n1, n2);
            let term = self.mul(cn, prod);
            acc = self.add(acc, term);
        }
        (acc, param_values)
    }

    /// Folds an [`ExprBuilder`] (any degree <= 2) into the graph.
    pub fn fold_builder(&mut self, builder: ExprBuilder) -> (NodeId, Vec<f64>) {
        self.fold_sqf(&builder.into_sqf())
    }

    pub fn add_constraint_output(&mut self, id: NodeId) {
        self.constraint_outputs.push(id);
    }

    pub fn add_objective_output(&mut self, id: NodeId) {
        self.objective_outputs.push(id);
    }

    /// Freezes the graph's outputs, checking every output id is in range.
    /// Given the append-only arena, out-of-range ids can only arise from a
    /// bug elsewhere, but the check is kept here as the documented
    /// finalize boundary.
    pub fn finalize(&self) -> GraphResult<()> {
        for &id in self.constraint_outputs.iter().chain(&self.objective_outputs) {
            if id.idx() >= self.nodes.len() {
                return Err(GraphError::DanglingOutput(id.0));
            }
        }
        Ok(())
    }
}

thread_local! {
    static GRAPH_STACK: RefCell<Vec<Rc<RefCell<NLGraph>>>> = RefCell::new(Vec::new());
}

/// A handle to one recorded graph, shareable across the calls that build
/// it. Clone is cheap (reference-counted).
#[derive(Debug, Clone)]
pub struct GraphHandle(Rc<RefCell<NLGraph>>);

impl GraphHandle {
    pub fn new() -> Self {
        GraphHandle(Rc::new(RefCell::new(NLGraph::new())))
    }

    /// Pushes this graph onto the thread-local recording stack. All
    /// graph-only constructors called while the returned guard is alive
    /// target this graph. Dropping the guard pops the stack, even on
    /// panic/early-return, so the context is always exited.
    pub fn enter(&self) -> GraphScope {
        GRAPH_STACK.with(|s| s.borrow_mut().push(self.0.clone()));
        GraphScope { _private: () }
    }

    pub fn with_graph<R>(&self, f: impl FnOnce(&mut NLGraph) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn snapshot(&self) -> NLGraph {
        self.0.borrow().clone()
    }
}

impl Default for GraphHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for an entered graph-recording context; pops the
/// thread-local stack on drop.
#[must_use = "the graph context is only active while this guard is alive"]
pub struct GraphScope {
    _private: (),
}

impl Drop for GraphScope {
    fn drop(&mut self) {
        GRAPH_STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// The innermost active graph on this thread, if any.
pub fn current_graph() -> Option<Rc<RefCell<NLGraph>>> {
    GRAPH_STACK.with(|s| s.borrow().last().cloned())
}

pub fn is_graph_active() -> bool {
    GRAPH_STACK.with(|s| !s.borrow().is_empty())
}

/// Runs `f` against the innermost active graph, or returns
/// [`GraphError::NoActiveGraph`] if no context is active.
pub fn with_current_graph<R>(f: impl FnOnce(&mut NLGraph) -> R) -> GraphResult<R> {
    let g = current_graph().ok_or(GraphError::NoActiveGraph)?;
    Ok(f(&mut g.borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;

    #[test]
    fn nested_adds_collapse_into_one_nary_node() {
        let mut g = NLGraph::new();
        let a = g.add_constant(1.0);
        let b = g.add_constant(2.0);
        let c = g.add_constant(3.0);
        let ab = g.add(a, b);
        let abc = g.add(ab, c);
        match g.node(abc) {
            Node::Nary(NaryOp::Add, children) => assert_eq!(children.len(), 3),
            other => panic!("expected flattened Add node, got {other:?}"),
        }
    }

    #[test]
    fn pow_int_positive_uses_repeated_squaring() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let x5 = g.pow_int(x, 5);
        // 5 = 101b: expect a handful of Mul nodes, not a Pow(f64) call.
        assert!(matches!(g.node(x5), Node::Nary(NaryOp::Mul, _)));
    }

    #[test]
    fn pow_int_negative_is_reciprocal() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let inv = g.pow_int(x, -2);
        assert!(matches!(g.node(inv), Node::Binary(BinaryOp::Div, _, _)));
    }

    #[test]
    fn pow_int_zero_is_one() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let one = g.pow_int(x, 0);
        assert!(matches!(g.node(one), Node::Constant(c) if *c == 1.0));
    }

    #[test]
    fn add_variable_is_shared_across_calls() {
        let mut g = NLGraph::new();
        let v = VarIdx::new(3);
        let a = g.add_variable(v);
        let b = g.add_variable(v);
        assert_eq!(a, b);
        assert_eq!(g.variables(), &[v]);
    }

    #[test]
    fn recording_context_stack_is_thread_local_and_scoped() {
        assert!(!is_graph_active());
        let handle = GraphHandle::new();
        {
            let _scope = handle.enter();
            assert!(is_graph_active());
            with_current_graph(|g| {
                g.add_constant(42.0);
            })
            .unwrap();
        }
        assert!(!is_graph_active());
        let snap = handle.snapshot();
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn constructors_fail_outside_any_context() {
        assert!(!is_graph_active());
        let err = with_current_graph(|_g| ()).unwrap_err();
        assert!(matches!(err, GraphError::NoActiveGraph));
    }

    #[test]
    fn fold_saf_round_trips_value() {
        use algform_core::ScalarAffineFunction;
        let x = VarIdx::new(0);
        let y = VarIdx::new(1);
        let saf = ScalarAffineFunction {
            variables: vec![x, y],
            coefficients: vec![2.0, 3.0],
            constant: 1.0,
        };
        let mut g = NLGraph::new();
        let (root, param_values) = g.fold_saf(&saf);
        g.add_objective_output(root);
        g.finalize().unwrap();
        assert_eq!(g.objective_outputs().len(), 1);
        // two coefficients plus the constant term, each its own parameter slot
        assert_eq!(param_values, vec![2.0, 3.0, 1.0]);
        assert_eq!(g.n_parameters(), 3);
    }
}
