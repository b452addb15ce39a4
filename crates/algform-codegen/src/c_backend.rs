//! Deterministic C-text lowering of one [`NLGraph`] to a single `void`
//! function, grounded directly on
//! `examples/original_source/.../codegen_c.py`'s `generate_csrc_from_graph`:
//! the addressing scheme (`p`/`w`/`x` slot ranges, `c[]` constant array,
//! `v[]` computed-value array), the `op2name` table, and the
//! infix-vs-call emission split are all a literal translation — a code
//! generator's textual output *is* its own specification.

use crate::error::{CodegenError, CodegenResult};
use crate::signature::FunctionSignature;
use algform_graph::{BinaryOp, NLGraph, NaryOp, Node, NodeId, TernaryOp, UnaryOp};
use std::fmt::Write as _;

/// Static helpers every generated translation unit needs: `azmul` (an
/// exact-zero-preserving multiply autodiff relies on to keep sparsity
/// patterns stable) and `sign`.
pub fn prelude() -> &'static str {
    "#include <stddef.h>\n\
     #include <math.h>\n\
     \n\
     typedef double float_point_t;\n\
     \n\
     static float_point_t azmul(float_point_t x, float_point_t y) {\n\
     \x20   if (x == 0.0) return 0.0;\n\
     \x20   return x * y;\n\
     }\n\
     \n\
     static float_point_t sign(float_point_t x) {\n\
     \x20   if (x > 0.0) return 1.0;\n\
     \x20   if (x == 0.0) return 0.0;\n\
     \x20   return -1.0;\n\
     }\n\n"
}

fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Abs => "fabs",
        UnaryOp::Sign => "sign",
        UnaryOp::Acos => "acos",
        UnaryOp::Acosh => "acosh",
        UnaryOp::Asin => "asin",
        UnaryOp::Asinh => "asinh",
        UnaryOp::Atan => "atan",
        UnaryOp::Atanh => "atanh",
        UnaryOp::Cos => "cos",
        UnaryOp::Cosh => "cosh",
        UnaryOp::Erf => "erf",
        UnaryOp::Erfc => "erfc",
        UnaryOp::Exp => "exp",
        UnaryOp::Expm1 => "expm1",
        UnaryOp::Log => "log",
        UnaryOp::Log10 => "log10",
        UnaryOp::Log1p => "log1p",
        UnaryOp::Sin => "sin",
        UnaryOp::Sinh => "sinh",
        UnaryOp::Sqrt => "sqrt",
        UnaryOp::Tan => "tan",
        UnaryOp::Tanh => "tanh",
    }
}

enum BinaryEmit {
    Infix(&'static str),
    Call(&'static str),
}

fn binary_emit(op: BinaryOp) -> BinaryEmit {
    match op {
        BinaryOp::Add => BinaryEmit::Infix("+"),
        BinaryOp::Sub => BinaryEmit::Infix("-"),
        BinaryOp::Mul => BinaryEmit::Infix("*"),
        BinaryOp::Div => BinaryEmit::Infix("/"),
        BinaryOp::Eq => BinaryEmit::Infix("=="),
        BinaryOp::Ne => BinaryEmit::Infix("!="),
        BinaryOp::Lt => BinaryEmit::Infix("<"),
        BinaryOp::Le => BinaryEmit::Infix("<="),
        BinaryOp::Gt => BinaryEmit::Infix(">"),
        BinaryOp::Ge => BinaryEmit::Infix(">="),
        BinaryOp::Pow => BinaryEmit::Call("pow"),
    }
}

fn function_signature_line(name: &str, sig: &FunctionSignature) -> String {
    let mut args = vec!["const float_point_t* x".to_string()];
    if sig.has_parameter() {
        args.push("const float_point_t* p".to_string());
    }
    if sig.hessian_lagrange {
        args.push("const float_point_t* w".to_string());
    }
    args.push("float_point_t* y".to_string());
    if sig.indirect_x {
        args.push("const size_t* xi".to_string());
    }
    if sig.has_parameter() && sig.indirect_p {
        args.push("const size_t* pi".to_string());
    }
    if sig.hessian_lagrange && sig.indirect_w {
        args.push("const size_t* wi".to_string());
    }
    if sig.indirect_y {
        args.push("const size_t* yi".to_string());
    }
    format!("void {name}({})", args.join(", "))
}

/// Lowers `graph` into a standalone C function definition named `name`
/// (plus a leading `extern` prototype, returned separately so callers can
/// build a shared header). `graph`'s own `Node::Parameter` slots
/// `[0, sig.np)` address `p[]`; slots `[sig.np, sig.np + sig.nw)` (only
/// reachable when `sig.hessian_lagrange`) address `w[]`.
pub fn generate(graph: &NLGraph, name: &str, sig: &FunctionSignature) -> CodegenResult<(String, String)> {
    let outputs: Vec<NodeId> = graph
        .constraint_outputs()
        .iter()
        .chain(graph.objective_outputs())
        .copied()
        .collect();
    if outputs.is_empty() {
        return Err(CodegenError::EmptyOutputs);
    }

    let mut constants: Vec<f64> = Vec::new();
    // Per-node C expression referencing either a leaf array or a v[] slot.
    let mut addr: Vec<String> = Vec::with_capacity(graph.len());
    let mut n_result = 0usize;
    let mut body = String::new();

    for i in 0..graph.len() {
        let id = NodeId(i as u32);
        let a_of = |m: &[String], n: NodeId| -> CodegenResult<&String> {
            m.get(n.0 as usize).ok_or(CodegenError::DanglingNode(n.0))
        };
        match graph.node(id).clone() {
            Node::Constant(c) => {
                let idx = constants.len();
                constants.push(c);
                addr.push(format!("c[{idx}]"));
            }
            Node::Variable(v) => {
                let slot = graph
                    .variables()
                    .iter()
                    .position(|&vv| vv == v)
                    .expect("variable node must be registered in graph.variables()");
                addr.push(if sig.indirect_x {
                    format!("x[xi[{slot}]]")
                } else {
                    format!("x[{slot}]")
                });
            }
            Node::Parameter(slot) => {
                if sig.hessian_lagrange && slot >= sig.np {
                    let wslot = slot - sig.np;
                    addr.push(if sig.indirect_w {
                        format!("w[wi[{wslot}]]")
                    } else {
                        format!("w[{wslot}]")
                    });
                } else if sig.indirect_p {
                    addr.push(format!("p[pi[{slot}]]"));
                } else {
                    addr.push(format!("p[{slot}]"));
                }
            }
            Node::Unary(op, a) => {
                let arg = a_of(&addr, a)?.clone();
                let expr = if matches!(op, UnaryOp::Neg) {
                    format!("-({arg})")
                } else {
                    format!("{}({arg})", unary_name(op))
                };
                writeln!(body, "    v[{n_result}] = {expr};").unwrap();
                addr.push(format!("v[{n_result}]"));
                n_result += 1;
            }
            Node::Binary(op, a, b) => {
                let arg1 = a_of(&addr, a)?.clone();
                let arg2 = a_of(&addr, b)?.clone();
                let expr = match binary_emit(op) {
                    BinaryEmit::Infix(sym) => format!("{arg1} {sym} {arg2}"),
                    BinaryEmit::Call(name) => format!("{name}({arg1}, {arg2})"),
                };
                writeln!(body, "    v[{n_result}] = {expr};").unwrap();
                addr.push(format!("v[{n_result}]"));
                n_result += 1;
            }
            Node::Ternary(TernaryOp::IfThenElse, c, t, e) => {
                let cond = a_of(&addr, c)?.clone();
                let then_ = a_of(&addr, t)?.clone();
                let else_ = a_of(&addr, e)?.clone();
                writeln!(body, "    v[{n_result}] = ({cond} != 0.0) ? ({then_}) : ({else_});").unwrap();
                addr.push(format!("v[{n_result}]"));
                n_result += 1;
            }
            Node::Nary(op, children) => {
                let mut parts = Vec::with_capacity(children.len());
                for c in &children {
                    parts.push(a_of(&addr, *c)?.clone());
                }
                let sep = match op {
                    NaryOp::Add => " + ",
                    NaryOp::Mul => " * ",
                };
                writeln!(body, "    v[{n_result}] = {};", parts.join(sep)).unwrap();
                addr.push(format!("v[{n_result}]"));
                n_result += 1;
            }
        }
    }

    let mut out = String::new();
    let proto = function_signature_line(name, sig);
    writeln!(out, "{proto}").unwrap();
    writeln!(out, "{{").unwrap();
    writeln!(out, "    float_point_t v[{}];", n_result.max(1)).unwrap();
    let cs: Vec<String> = constants.iter().map(|c| format!("{c:e}")).collect();
    writeln!(
        out,
        "    static const float_point_t c[{}] = {{ {} }};",
        constants.len().max(1),
        if cs.is_empty() { "0.0".to_string() } else { cs.join(", ") }
    )
    .unwrap();
    out.push_str(&body);

    let assign_op = if sig.add_y { "+=" } else { "=" };
    for (i, &out_id) in outputs.iter().enumerate() {
        let value = addr
            .get(out_id.0 as usize)
            .ok_or(CodegenError::DanglingNode(out_id.0))?;
        if sig.indirect_y {
            writeln!(out, "    y[yi[{i}]] {assign_op} {value};").unwrap();
        } else {
            writeln!(out, "    y[{i}] {assign_op} {value};").unwrap();
        }
    }
    writeln!(out, "}}").unwrap();

    let extern_decl = format!("extern {proto};");
    Ok((out, extern_decl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;

    #[test]
    fn generates_simple_function_body() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let p = g.add_parameter(0);
        let prod = g.mul(p, x);
        g.add_objective_output(prod);

        let sig = FunctionSignature {
            np: 1,
            ..Default::default()
        };
        let (src, proto) = generate(&g, "f0", &sig).unwrap();
        assert!(src.contains("void f0(const float_point_t* x, const float_point_t* p, float_point_t* y)"));
        assert!(src.contains("p[0]"));
        assert!(src.contains("x[0]"));
        assert!(src.contains("y[0] ="));
        assert!(proto.starts_with("extern void f0"));
    }

    #[test]
    fn indirect_addressing_uses_index_arrays() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let neg = g.neg(x);
        g.add_objective_output(neg);

        let sig = FunctionSignature {
            indirect_x: true,
            indirect_y: true,
            ..Default::default()
        };
        let (src, _) = generate(&g, "f1", &sig).unwrap();
        assert!(src.contains("x[xi[0]]"));
        assert!(src.contains("y[yi[0]]"));
    }

    #[test]
    fn hessian_lagrange_addresses_w_after_p() {
        let mut g = NLGraph::new();
        let p0 = g.add_parameter(0);
        let w0 = g.add_parameter(1);
        let prod = g.mul(p0, w0);
        g.add_objective_output(prod);

        let sig = FunctionSignature {
            np: 1,
            nw: 1,
            hessian_lagrange: true,
            ..Default::default()
        };
        let (src, _) = generate(&g, "h0", &sig).unwrap();
        assert!(src.contains("p[0]"));
        assert!(src.contains("w[0]"));
    }

    #[test]
    fn empty_graph_is_an_error() {
        let g = NLGraph::new();
        let sig = FunctionSignature::default();
        assert!(matches!(generate(&g, "e", &sig), Err(CodegenError::EmptyOutputs)));
    }
}
