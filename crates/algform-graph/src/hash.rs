//! Structural-isomorphism hashing and grouping of [`NLGraph`] instances.
//!
//! Two graphs recorded from the same Rust call site with different
//! concrete variables and constant values are the same *shape*: same
//! op-kind topology, same wiring, same count of distinct variable and
//! parameter slots. [`GraphHash`] ignores concrete [`VarIdx`] values and
//! constant numbers so such instances collapse into one compiled group.

use crate::graph::{BinaryOp, NLGraph, NaryOp, Node, NodeId, TernaryOp, UnaryOp};
use algform_core::VarIdx;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Order-sensitive structural hash of a graph's shape, independent of
/// concrete variable ids and constant values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphHash(u64);

/// Per-graph slot assignment used both to compute the hash (so that two
/// graphs referencing "the first variable seen" hash identically even if
/// their concrete [`VarIdx`] differ) and, for actual members, to record
/// the concrete binding.
fn variable_slots(graph: &NLGraph) -> HashMap<VarIdx, usize> {
    graph
        .variables()
        .iter()
        .enumerate()
        .map(|(slot, &v)| (v, slot))
        .collect()
}

fn hash_node(
    graph: &NLGraph,
    id: NodeId,
    var_slots: &HashMap<VarIdx, usize>,
    hasher: &mut impl Hasher,
) {
    match graph.node(id) {
        Node::Constant(_) => {
            0u8.hash(hasher);
        }
        Node::Variable(v) => {
            1u8.hash(hasher);
            var_slots[v].hash(hasher);
        }
        Node::Parameter(slot) => {
            2u8.hash(hasher);
            slot.hash(hasher);
        }
        Node::Unary(op, a) => {
            3u8.hash(hasher);
            unary_tag(*op).hash(hasher);
            hash_node(graph, *a, var_slots, hasher);
        }
        Node::Binary(op, a, b) => {
            4u8.hash(hasher);
            binary_tag(*op).hash(hasher);
            hash_node(graph, *a, var_slots, hasher);
            hash_node(graph, *b, var_slots, hasher);
        }
        Node::Ternary(op, a, b, c) => {
            5u8.hash(hasher);
            ternary_tag(*op).hash(hasher);
            hash_node(graph, *a, var_slots, hasher);
            hash_node(graph, *b, var_slots, hasher);
            hash_node(graph, *c, var_slots, hasher);
        }
        Node::Nary(op, children) => {
            6u8.hash(hasher);
            nary_tag(*op).hash(hasher);
            children.len().hash(hasher);
            for &c in children {
                hash_node(graph, c, var_slots, hasher);
            }
        }
    }
}

fn unary_tag(op: UnaryOp) -> u8 {
    op as u8
}

fn binary_tag(op: BinaryOp) -> u8 {
    op as u8
}

fn ternary_tag(op: TernaryOp) -> u8 {
    op as u8
}

fn nary_tag(op: NaryOp) -> u8 {
    op as u8
}

impl GraphHash {
    /// Hashes the shape of every registered constraint and objective
    /// output, in order, plus the variable/parameter slot counts.
    pub fn of(graph: &NLGraph) -> Self {
        let var_slots = variable_slots(graph);
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        graph.variables().len().hash(&mut hasher);
        graph.n_parameters().hash(&mut hasher);
        graph.constraint_outputs().len().hash(&mut hasher);
        graph.objective_outputs().len().hash(&mut hasher);
        for &id in graph.constraint_outputs() {
            hash_node(graph, id, &var_slots, &mut hasher);
        }
        for &id in graph.objective_outputs() {
            hash_node(graph, id, &var_slots, &mut hasher);
        }
        GraphHash(hasher.finish())
    }
}

/// Structural equality check between two graphs, used to disambiguate
/// same-hash-but-different-shape collisions. Compares op-kind topology
/// and wiring only: ignores concrete [`VarIdx`] (compared by slot
/// position) and constant numeric values.
pub fn structurally_equal(a: &NLGraph, b: &NLGraph) -> bool {
    if a.variables().len() != b.variables().len() || a.n_parameters() != b.n_parameters() {
        return false;
    }
    if a.constraint_outputs().len() != b.constraint_outputs().len()
        || a.objective_outputs().len() != b.objective_outputs().len()
    {
        return false;
    }
    let a_slots = variable_slots(a);
    let b_slots = variable_slots(b);
    let outputs_equal = |a_ids: &[NodeId], b_ids: &[NodeId]| {
        a_ids.len() == b_ids.len()
            && a_ids
                .iter()
                .zip(b_ids)
                .all(|(&x, &y)| nodes_equal(a, x, &a_slots, b, y, &b_slots))
    };
    outputs_equal(a.constraint_outputs(), b.constraint_outputs())
        && outputs_equal(a.objective_outputs(), b.objective_outputs())
}

fn nodes_equal(
    a: &NLGraph,
    a_id: NodeId,
    a_slots: &HashMap<VarIdx, usize>,
    b: &NLGraph,
    b_id: NodeId,
    b_slots: &HashMap<VarIdx, usize>,
) -> bool {
    match (a.node(a_id), b.node(b_id)) {
        (Node::Constant(_), Node::Constant(_)) => true,
        (Node::Variable(va), Node::Variable(vb)) => a_slots[va] == b_slots[vb],
        (Node::Parameter(sa), Node::Parameter(sb)) => sa == sb,
        (Node::Unary(oa, xa), Node::Unary(ob, xb)) => {
            oa == ob && nodes_equal(a, *xa, a_slots, b, *xb, b_slots)
        }
        (Node::Binary(oa, xa, ya), Node::Binary(ob, xb, yb)) => {
            oa == ob
                && nodes_equal(a, *xa, a_slots, b, *xb, b_slots)
                && nodes_equal(a, *ya, a_slots, b, *yb, b_slots)
        }
        (Node::Ternary(oa, xa, ya, za), Node::Ternary(ob, xb, yb, zb)) => {
            oa == ob
                && nodes_equal(a, *xa, a_slots, b, *xb, b_slots)
                && nodes_equal(a, *ya, a_slots, b, *yb, b_slots)
                && nodes_equal(a, *za, a_slots, b, *zb, b_slots)
        }
        (Node::Nary(oa, ca), Node::Nary(ob, cb)) => {
            oa == ob
                && ca.len() == cb.len()
                && ca
                    .iter()
                    .zip(cb)
                    .all(|(&x, &y)| nodes_equal(a, x, a_slots, b, y, b_slots))
        }
        _ => false,
    }
}

/// One equivalence class of structurally-isomorphic graph instances.
/// The representative is the first-recorded graph of this shape;
/// members store only what differs instance to instance (the bound
/// variable and parameter vectors), recorded by the caller.
pub struct GraphGroup {
    pub hash: GraphHash,
    pub representative: NLGraph,
    member_count: usize,
}

impl GraphGroup {
    fn new(hash: GraphHash, representative: NLGraph) -> Self {
        GraphGroup {
            hash,
            representative,
            member_count: 1,
        }
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }
}

/// Groups a sequence of recorded graphs into equivalence classes,
/// preserving first-seen order for representative selection. Returns,
/// per input graph, the index of the group it was assigned to.
#[derive(Default)]
pub struct GraphGrouper {
    groups: Vec<GraphGroup>,
}

impl GraphGrouper {
    pub fn new() -> Self {
        GraphGrouper::default()
    }

    pub fn groups(&self) -> &[GraphGroup] {
        &self.groups
    }

    /// Assigns `graph` to an existing group if one is structurally
    /// isomorphic, or creates a new one. Returns the group index.
    pub fn assign(&mut self, graph: &NLGraph) -> usize {
        let hash = GraphHash::of(graph);
        for (idx, group) in self.groups.iter_mut().enumerate() {
            if group.hash == hash && structurally_equal(&group.representative, graph) {
                group.member_count += 1;
                return idx;
            }
        }
        self.groups.push(GraphGroup::new(hash, graph.clone()));
        self.groups.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NLGraph;
    use algform_core::VarIdx;

    fn build_linear(a: VarIdx, b: VarIdx) -> NLGraph {
        let mut g = NLGraph::new();
        let va = g.add_variable(a);
        let vb = g.add_variable(b);
        let c = g.add_constant(2.0);
        let prod = g.mul(c, va);
        let sum = g.add(prod, vb);
        g.add_objective_output(sum);
        g
    }

    #[test]
    fn isomorphic_instances_share_a_hash() {
        let g1 = build_linear(VarIdx::new(0), VarIdx::new(1));
        let g2 = build_linear(VarIdx::new(40), VarIdx::new(41));
        assert_eq!(GraphHash::of(&g1), GraphHash::of(&g2));
        assert!(structurally_equal(&g1, &g2));
    }

    #[test]
    fn different_constant_value_does_not_change_shape() {
        let mut g1 = NLGraph::new();
        let x = g1.add_variable(VarIdx::new(0));
        let c1 = g1.add_constant(5.0);
        let m1 = g1.mul(c1, x);
        g1.add_objective_output(m1);

        let mut g2 = NLGraph::new();
        let x2 = g2.add_variable(VarIdx::new(0));
        let c2 = g2.add_constant(-99.0);
        let m2 = g2.mul(c2, x2);
        g2.add_objective_output(m2);

        assert_eq!(GraphHash::of(&g1), GraphHash::of(&g2));
        assert!(structurally_equal(&g1, &g2));
    }

    #[test]
    fn different_topology_is_not_equal() {
        let mut g1 = NLGraph::new();
        let x = g1.add_variable(VarIdx::new(0));
        let y = g1.add_variable(VarIdx::new(1));
        let s = g1.add(x, y);
        g1.add_objective_output(s);

        let mut g2 = NLGraph::new();
        let x2 = g2.add_variable(VarIdx::new(0));
        let y2 = g2.add_variable(VarIdx::new(1));
        let p = g2.mul(x2, y2);
        g2.add_objective_output(p);

        assert!(!structurally_equal(&g1, &g2));
    }

    #[test]
    fn grouper_assigns_isomorphic_instances_to_the_same_group() {
        let mut grouper = GraphGrouper::new();
        let g1 = build_linear(VarIdx::new(0), VarIdx::new(1));
        let g2 = build_linear(VarIdx::new(2), VarIdx::new(3));
        let idx1 = grouper.assign(&g1);
        let idx2 = grouper.assign(&g2);
        assert_eq!(idx1, idx2);
        assert_eq!(grouper.groups()[idx1].member_count(), 2);
    }
}
