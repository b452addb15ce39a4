//! LLVM-IR textual lowering of one [`NLGraph`], the JIT sibling of
//! [`crate::c_backend`]. No teacher or pack example emits LLVM IR
//! directly, so this backend is grounded on the same node-traversal
//! shape as `c_backend` (shared node-kind alphabet, same addressing
//! scheme) rather than on a specific source file; it produces `.ll` text
//! for the same reason `c_backend` produces C text — a generator's
//! output format is language-neutral, only the target syntax changes.
//! `algform-jit::llvm_jit` parses this text with `inkwell` and JIT
//! executes it; this crate has no LLVM dependency of its own.

use crate::error::{CodegenError, CodegenResult};
use crate::signature::FunctionSignature;
use algform_graph::{BinaryOp, NLGraph, NaryOp, Node, NodeId, TernaryOp, UnaryOp};
use std::fmt::Write as _;

fn unary_callee(op: UnaryOp) -> Option<&'static str> {
    match op {
        UnaryOp::Neg => None, // lowered to `fneg`, no call
        UnaryOp::Abs => Some("@llvm.fabs.f64"),
        UnaryOp::Sign => Some("@algform_sign"),
        UnaryOp::Acos => Some("@acos"),
        UnaryOp::Acosh => Some("@acosh"),
        UnaryOp::Asin => Some("@asin"),
        UnaryOp::Asinh => Some("@asinh"),
        UnaryOp::Atan => Some("@atan"),
        UnaryOp::Atanh => Some("@atanh"),
        UnaryOp::Cos => Some("@llvm.cos.f64"),
        UnaryOp::Cosh => Some("@cosh"),
        UnaryOp::Erf => Some("@erf"),
        UnaryOp::Erfc => Some("@erfc"),
        UnaryOp::Exp => Some("@llvm.exp.f64"),
        UnaryOp::Expm1 => Some("@expm1"),
        UnaryOp::Log => Some("@llvm.log.f64"),
        UnaryOp::Log10 => Some("@llvm.log10.f64"),
        UnaryOp::Log1p => Some("@log1p"),
        UnaryOp::Sin => Some("@llvm.sin.f64"),
        UnaryOp::Sinh => Some("@sinh"),
        UnaryOp::Sqrt => Some("@llvm.sqrt.f64"),
        UnaryOp::Tan => Some("@tan"),
        UnaryOp::Tanh => Some("@tanh"),
    }
}

/// External/intrinsic declarations referenced by a module using every
/// unary op plus `pow`/`azmul`. Emitting the full set unconditionally
/// keeps this function independent of which ops a given graph actually
/// uses; unused declarations are harmless in LLVM IR.
fn declarations() -> &'static str {
    "declare double @llvm.fabs.f64(double)\n\
     declare double @acos(double)\n\
     declare double @acosh(double)\n\
     declare double @asin(double)\n\
     declare double @asinh(double)\n\
     declare double @atan(double)\n\
     declare double @atanh(double)\n\
     declare double @llvm.cos.f64(double)\n\
     declare double @cosh(double)\n\
     declare double @erf(double)\n\
     declare double @erfc(double)\n\
     declare double @llvm.exp.f64(double)\n\
     declare double @expm1(double)\n\
     declare double @llvm.log.f64(double)\n\
     declare double @llvm.log10.f64(double)\n\
     declare double @log1p(double)\n\
     declare double @llvm.sin.f64(double)\n\
     declare double @sinh(double)\n\
     declare double @llvm.sqrt.f64(double)\n\
     declare double @tan(double)\n\
     declare double @tanh(double)\n\
     declare double @llvm.pow.f64(double, double)\n\n\
     define private double @algform_azmul(double %x, double %y) {\n\
     \x20   %iszero = fcmp oeq double %x, 0.0\n\
     \x20   %prod = fmul double %x, %y\n\
     \x20   %r = select i1 %iszero, double 0.0, double %prod\n\
     \x20   ret double %r\n\
     }\n\n\
     define private double @algform_sign(double %x) {\n\
     \x20   %gt = fcmp ogt double %x, 0.0\n\
     \x20   %eq = fcmp oeq double %x, 0.0\n\
     \x20   %negone = select i1 %eq, double 0.0, double -1.0\n\
     \x20   %r = select i1 %gt, double 1.0, double %negone\n\
     \x20   ret double %r\n\
     }\n\n"
}

fn function_signature_args(sig: &FunctionSignature) -> Vec<String> {
    let mut args = vec!["double* noalias %x".to_string()];
    if sig.has_parameter() {
        args.push("double* noalias %p".to_string());
    }
    if sig.hessian_lagrange {
        args.push("double* noalias %w".to_string());
    }
    args.push("double* noalias %y".to_string());
    if sig.indirect_x {
        args.push("i64* noalias %xi".to_string());
    }
    if sig.has_parameter() && sig.indirect_p {
        args.push("i64* noalias %pi".to_string());
    }
    if sig.hessian_lagrange && sig.indirect_w {
        args.push("i64* noalias %wi".to_string());
    }
    if sig.indirect_y {
        args.push("i64* noalias %yi".to_string());
    }
    args
}

/// One SSA register, either a freshly-loaded leaf or a computed value.
#[derive(Clone)]
struct Reg(String);

struct Emitter {
    body: String,
    tmp: usize,
}

impl Emitter {
    fn fresh(&mut self) -> String {
        let name = format!("%t{}", self.tmp);
        self.tmp += 1;
        name
    }

    fn load_indexed(&mut self, base: &str, index_array: Option<&str>, slot: usize) -> Reg {
        let idx_reg = if let Some(ia) = index_array {
            let gep = self.fresh();
            writeln!(self.body, "  {gep} = getelementptr inbounds i64, i64* {ia}, i64 {slot}").unwrap();
            let idx = self.fresh();
            writeln!(self.body, "  {idx} = load i64, i64* {gep}").unwrap();
            idx
        } else {
            format!("{slot}")
        };
        let gep = self.fresh();
        writeln!(self.body, "  {gep} = getelementptr inbounds double, double* {base}, i64 {idx_reg}").unwrap();
        let val = self.fresh();
        writeln!(self.body, "  {val} = load double, double* {gep}").unwrap();
        Reg(val)
    }
}

/// Lowers `graph` into an LLVM-IR module defining `void @name(...)`
/// matching `sig`'s addressing scheme. Returns the full module text.
pub fn generate(graph: &NLGraph, name: &str, sig: &FunctionSignature) -> CodegenResult<String> {
    let outputs: Vec<NodeId> = graph
        .constraint_outputs()
        .iter()
        .chain(graph.objective_outputs())
        .copied()
        .collect();
    if outputs.is_empty() {
        return Err(CodegenError::EmptyOutputs);
    }

    let mut em = Emitter {
        body: String::new(),
        tmp: 0,
    };
    let mut regs: Vec<Reg> = Vec::with_capacity(graph.len());

    for i in 0..graph.len() {
        let id = NodeId(i as u32);
        let reg_of = |m: &[Reg], n: NodeId| -> CodegenResult<Reg> {
            m.get(n.0 as usize).cloned().ok_or(CodegenError::DanglingNode(n.0))
        };
        let reg = match graph.node(id).clone() {
            Node::Constant(c) => Reg(format!("0x{:016X}", c.to_bits())),
            Node::Variable(v) => {
                let slot = graph
                    .variables()
                    .iter()
                    .position(|&vv| vv == v)
                    .expect("variable node must be registered in graph.variables()");
                em.load_indexed("%x", sig.indirect_x.then_some("%xi"), slot)
            }
            Node::Parameter(slot) => {
                if sig.hessian_lagrange && slot >= sig.np {
                    em.load_indexed("%w", sig.indirect_w.then_some("%wi"), slot - sig.np)
                } else {
                    em.load_indexed("%p", sig.indirect_p.then_some("%pi"), slot)
                }
            }
            Node::Unary(op, a) => {
                let arg = reg_of(&regs, a)?;
                let dst = em.fresh();
                if matches!(op, UnaryOp::Neg) {
                    writeln!(em.body, "  {dst} = fneg double {}", arg.0).unwrap();
                } else {
                    let callee = unary_callee(op).unwrap();
                    writeln!(em.body, "  {dst} = call double {callee}(double {})", arg.0).unwrap();
                }
                Reg(dst)
            }
            Node::Binary(op, a, b) => {
                let la = reg_of(&regs, a)?;
                let lb = reg_of(&regs, b)?;
                let dst = em.fresh();
                match op {
                    BinaryOp::Add => writeln!(em.body, "  {dst} = fadd double {}, {}", la.0, lb.0).unwrap(),
                    BinaryOp::Sub => writeln!(em.body, "  {dst} = fsub double {}, {}", la.0, lb.0).unwrap(),
                    BinaryOp::Mul => writeln!(em.body, "  {dst} = fmul double {}, {}", la.0, lb.0).unwrap(),
                    BinaryOp::Div => writeln!(em.body, "  {dst} = fdiv double {}, {}", la.0, lb.0).unwrap(),
                    BinaryOp::Pow => {
                        writeln!(em.body, "  {dst} = call double @llvm.pow.f64(double {}, double {})", la.0, lb.0).unwrap()
                    }
                    cmp => {
                        let pred = match cmp {
                            BinaryOp::Eq => "oeq",
                            BinaryOp::Ne => "one",
                            BinaryOp::Lt => "olt",
                            BinaryOp::Le => "ole",
                            BinaryOp::Gt => "ogt",
                            BinaryOp::Ge => "oge",
                            _ => unreachable!(),
                        };
                        let bit = em.fresh();
                        writeln!(em.body, "  {bit} = fcmp {pred} double {}, {}", la.0, lb.0).unwrap();
                        writeln!(em.body, "  {dst} = select i1 {bit}, double 1.0, double 0.0").unwrap();
                    }
                }
                Reg(dst)
            }
            Node::Ternary(TernaryOp::IfThenElse, c, t, e) => {
                let lc = reg_of(&regs, c)?;
                let lt = reg_of(&regs, t)?;
                let le = reg_of(&regs, e)?;
                let bit = em.fresh();
                writeln!(em.body, "  {bit} = fcmp one double {}, 0.0", lc.0).unwrap();
                let dst = em.fresh();
                writeln!(em.body, "  {dst} = select i1 {bit}, double {}, double {}", lt.0, le.0).unwrap();
                Reg(dst)
            }
            Node::Nary(op, children) => {
                let mut it = children.iter();
                let first = reg_of(&regs, *it.next().expect("n-ary node has at least one child"))?;
                let mut acc = first;
                for &c in it {
                    let next = reg_of(&regs, c)?;
                    let dst = em.fresh();
                    match op {
                        NaryOp::Add => writeln!(em.body, "  {dst} = fadd double {}, {}", acc.0, next.0).unwrap(),
                        NaryOp::Mul => writeln!(em.body, "  {dst} = fmul double {}, {}", acc.0, next.0).unwrap(),
                    }
                    acc = Reg(dst);
                }
                acc
            }
        };
        regs.push(reg);
    }

    let mut module = String::new();
    module.push_str(declarations());
    let args = function_signature_args(sig).join(", ");
    writeln!(module, "define void @{name}({args}) {{").unwrap();
    writeln!(module, "entry:").unwrap();
    module.push_str(&em.body);

    for (i, &out_id) in outputs.iter().enumerate() {
        let val = regs
            .get(out_id.0 as usize)
            .cloned()
            .ok_or(CodegenError::DanglingNode(out_id.0))?;
        let idx_reg = if sig.indirect_y {
            let gep = em.fresh();
            writeln!(module, "  {gep} = getelementptr inbounds i64, i64* %yi, i64 {i}").unwrap();
            let idx = em.fresh();
            writeln!(module, "  {idx} = load i64, i64* {gep}").unwrap();
            idx
        } else {
            format!("{i}")
        };
        let gep = em.fresh();
        writeln!(module, "  {gep} = getelementptr inbounds double, double* %y, i64 {idx_reg}").unwrap();
        if sig.add_y {
            let old = em.fresh();
            writeln!(module, "  {old} = load double, double* {gep}").unwrap();
            let sum = em.fresh();
            writeln!(module, "  {sum} = fadd double {old}, {}", val.0).unwrap();
            writeln!(module, "  store double {sum}, double* {gep}").unwrap();
        } else {
            writeln!(module, "  store double {}, double* {gep}", val.0).unwrap();
        }
    }
    writeln!(module, "  ret void").unwrap();
    writeln!(module, "}}").unwrap();

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use algform_core::VarIdx;

    #[test]
    fn generates_simple_module() {
        let mut g = NLGraph::new();
        let x = g.add_variable(VarIdx::new(0));
        let neg = g.neg(x);
        g.add_objective_output(neg);

        let sig = FunctionSignature::default();
        let ir = generate(&g, "f0", &sig).unwrap();
        assert!(ir.contains("define void @f0(double* noalias %x, double* noalias %y)"));
        assert!(ir.contains("fneg double"));
        assert!(ir.contains("ret void"));
    }

    #[test]
    fn empty_graph_is_an_error() {
        let g = NLGraph::new();
        let sig = FunctionSignature::default();
        assert!(matches!(generate(&g, "e", &sig), Err(CodegenError::EmptyOutputs)));
    }
}
