//! Uniform calling convention for compiled evaluator functions.
//!
//! `algform-solver` always requests fully indirect signatures
//! (`indirect_x`/`indirect_p`/`indirect_w`/`indirect_y` all set), so only
//! four argument shapes ever occur in practice, driven by whether the
//! function has parameters (`np > 0`) and whether it is a
//! Hessian-of-the-Lagrangian evaluator (`hessian_lagrange`). Both JIT
//! back-ends produce code matching one of these four C prototypes (see
//! `algform_codegen::c_backend::function_signature_line` /
//! `llvm_backend::function_signature_args`), so a raw function-pointer
//! address resolved from either back-end can be transmuted the same way.

use algform_codegen::FunctionSignature;
use std::ffi::c_void;

pub type FnXY = unsafe extern "C" fn(x: *const f64, y: *mut f64, xi: *const usize, yi: *const usize);

pub type FnXPY = unsafe extern "C" fn(
    x: *const f64,
    p: *const f64,
    y: *mut f64,
    xi: *const usize,
    pi: *const usize,
    yi: *const usize,
);

pub type FnXWY = unsafe extern "C" fn(
    x: *const f64,
    w: *const f64,
    y: *mut f64,
    xi: *const usize,
    wi: *const usize,
    yi: *const usize,
);

pub type FnXPWY = unsafe extern "C" fn(
    x: *const f64,
    p: *const f64,
    w: *const f64,
    y: *mut f64,
    xi: *const usize,
    pi: *const usize,
    wi: *const usize,
    yi: *const usize,
);

/// A resolved, callable symbol, tagged with the argument shape its
/// compiled prototype actually has.
#[derive(Clone, Copy)]
pub enum CompiledFn {
    XY(FnXY),
    XPY(FnXPY),
    XWY(FnXWY),
    XPWY(FnXPWY),
}

impl CompiledFn {
    /// Builds a `CompiledFn` from a raw function-pointer address and the
    /// signature it was compiled with. `sig` must match the signature
    /// originally passed to `c_backend::generate`/`llvm_backend::generate`
    /// for this symbol, and must have every `indirect_*` flag set.
    pub fn from_raw(addr: *mut c_void, sig: &FunctionSignature) -> Self {
        debug_assert!(sig.indirect_x && sig.indirect_y, "algform-jit only supports fully indirect signatures");
        match (sig.has_parameter(), sig.hessian_lagrange) {
            (false, false) => CompiledFn::XY(unsafe { std::mem::transmute::<*mut c_void, FnXY>(addr) }),
            (true, false) => CompiledFn::XPY(unsafe { std::mem::transmute::<*mut c_void, FnXPY>(addr) }),
            (false, true) => CompiledFn::XWY(unsafe { std::mem::transmute::<*mut c_void, FnXWY>(addr) }),
            (true, true) => CompiledFn::XPWY(unsafe { std::mem::transmute::<*mut c_void, FnXPWY>(addr) }),
        }
    }

    /// Invokes the compiled function. Callers supply only the arrays the
    /// resolved shape actually needs; the others are ignored.
    ///
    /// # Safety
    /// `x`/`p`/`w`/`y` must be large enough for every offset the
    /// compiled function was generated to read or write, and `xi`/`pi`/
    /// `wi`/`yi` must contain valid in-bounds offsets into them.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn call(
        &self,
        x: &[f64],
        p: Option<&[f64]>,
        w: Option<&[f64]>,
        y: &mut [f64],
        xi: &[usize],
        pi: Option<&[usize]>,
        wi: Option<&[usize]>,
        yi: &[usize],
    ) {
        match self {
            CompiledFn::XY(f) => f(x.as_ptr(), y.as_mut_ptr(), xi.as_ptr(), yi.as_ptr()),
            CompiledFn::XPY(f) => f(
                x.as_ptr(),
                p.expect("signature XPY requires a parameter array").as_ptr(),
                y.as_mut_ptr(),
                xi.as_ptr(),
                pi.expect("signature XPY requires a parameter index array").as_ptr(),
                yi.as_ptr(),
            ),
            CompiledFn::XWY(f) => f(
                x.as_ptr(),
                w.expect("signature XWY requires a multiplier array").as_ptr(),
                y.as_mut_ptr(),
                xi.as_ptr(),
                wi.expect("signature XWY requires a multiplier index array").as_ptr(),
                yi.as_ptr(),
            ),
            CompiledFn::XPWY(f) => f(
                x.as_ptr(),
                p.expect("signature XPWY requires a parameter array").as_ptr(),
                w.expect("signature XPWY requires a multiplier array").as_ptr(),
                y.as_mut_ptr(),
                xi.as_ptr(),
                pi.expect("signature XPWY requires a parameter index array").as_ptr(),
                wi.expect("signature XPWY requires a multiplier index array").as_ptr(),
                yi.as_ptr(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn identity_xy(x: *const f64, y: *mut f64, xi: *const usize, yi: *const usize) {
        *y.add(*yi) = *x.add(*xi);
    }

    #[test]
    fn transmutes_and_calls_xy_shape() {
        let sig = FunctionSignature {
            indirect_x: true,
            indirect_y: true,
            ..Default::default()
        };
        let compiled = CompiledFn::from_raw(identity_xy as *mut c_void, &sig);
        let x = [42.0];
        let mut y = [0.0];
        unsafe { compiled.call(&x, None, None, &mut y, &[0], None, None, &[0]) };
        assert_eq!(y[0], 42.0);
    }
}
