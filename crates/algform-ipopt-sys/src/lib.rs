//! Native FFI bindings to IPOPT (Interior Point OPTimizer).
//!
//! Low-level unsafe bindings to the IPOPT C interface, plus a safe Rust
//! wrapper (`wrapper::Ipopt`) that algform-solver's `NLPModel` implements
//! against via the `ConstrainedProblem` trait.
//!
//! IPOPT implements an interior-point line-search filter method for
//! large-scale nonlinear optimization.
//!
//! # Building
//!
//! Links against IPOPT from, in order:
//! 1. `vendor/local/lib/` (pre-built)
//! 2. System IPOPT via pkg-config (fallback)
//!
//! # Reference
//!
//! Wächter, A., & Biegler, L. T. (2006). On the implementation of an interior-point
//! filter line-search algorithm for large-scale nonlinear programming.
//! *Mathematical Programming*, 106(1), 25-57.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

mod wrapper;

pub use wrapper::{
    BasicProblem, ConstrainedProblem, Ipopt, IpoptOption, Solution, SolveResult, SolveStatus,
    SolverData,
};

use std::os::raw::{c_char, c_double, c_int, c_void};

/// Floating-point number type (matches ipnumber in IPOPT).
pub type Number = c_double;

/// Index type for vectors/matrices (matches ipindex in IPOPT).
pub type Index = c_int;

/// Opaque pointer to IPOPT problem structure.
#[repr(C)]
pub struct IpoptProblemInfo {
    _private: [u8; 0],
}

pub type IpoptProblem = *mut IpoptProblemInfo;

/// User data pointer passed to callbacks.
pub type UserDataPtr = *mut c_void;

/// Return codes from IpoptSolve.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationReturnStatus {
    SolveSucceeded = 0,
    SolvedToAcceptableLevel = 1,
    InfeasibleProblemDetected = 2,
    SearchDirectionBecomesTooSmall = 3,
    DivergingIterates = 4,
    UserRequestedStop = 5,
    FeasiblePointFound = 6,

    MaximumIterationsExceeded = -1,
    RestorationFailed = -2,
    ErrorInStepComputation = -3,
    MaximumCpuTimeExceeded = -4,
    MaximumWallTimeExceeded = -5,

    NotEnoughDegreesOfFreedom = -10,
    InvalidProblemDefinition = -11,
    InvalidOption = -12,
    InvalidNumberDetected = -13,

    UnrecoverableException = -100,
    NonIpoptExceptionThrown = -101,
    InsufficientMemory = -102,
    InternalError = -199,
}

impl ApplicationReturnStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ApplicationReturnStatus::SolveSucceeded | ApplicationReturnStatus::SolvedToAcceptableLevel
        )
    }
}

/// Callback for evaluating objective function f(x).
pub type Eval_F_CB =
    extern "C" fn(n: Index, x: *const Number, new_x: c_int, obj_value: *mut Number, user_data: UserDataPtr) -> c_int;

/// Callback for evaluating gradient of objective function grad f(x).
pub type Eval_Grad_F_CB =
    extern "C" fn(n: Index, x: *const Number, new_x: c_int, grad_f: *mut Number, user_data: UserDataPtr) -> c_int;

/// Callback for evaluating constraint functions g(x).
pub type Eval_G_CB = extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: c_int,
    m: Index,
    g: *mut Number,
    user_data: UserDataPtr,
) -> c_int;

/// Callback for evaluating the Jacobian of constraints.
///
/// Called in two modes: `values == NULL` fills `iRow`/`jCol` with the
/// sparsity structure; `values != NULL` fills the nonzero values.
pub type Eval_Jac_G_CB = extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: c_int,
    m: Index,
    nele_jac: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> c_int;

/// Callback for evaluating the Hessian of the Lagrangian
/// sigma * grad^2 f(x) + sum_i lambda_i * grad^2 g_i(x).
///
/// Called in two modes: `values == NULL` fills `iRow`/`jCol` with the
/// lower-triangle sparsity structure; `values != NULL` fills the
/// nonzero values.
pub type Eval_H_CB = extern "C" fn(
    n: Index,
    x: *const Number,
    new_x: c_int,
    obj_factor: Number,
    m: Index,
    lambda: *const Number,
    new_lambda: c_int,
    nele_hess: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> c_int;

/// Callback for intermediate iteration info. Return false to terminate.
pub type Intermediate_CB = extern "C" fn(
    alg_mod: Index,
    iter_count: Index,
    obj_value: Number,
    inf_pr: Number,
    inf_du: Number,
    mu: Number,
    d_norm: Number,
    regularization_size: Number,
    alpha_du: Number,
    alpha_pr: Number,
    ls_trials: Index,
    user_data: UserDataPtr,
) -> c_int;

extern "C" {
    pub fn CreateIpoptProblem(
        n: Index,
        x_L: *const Number,
        x_U: *const Number,
        m: Index,
        g_L: *const Number,
        g_U: *const Number,
        nele_jac: Index,
        nele_hess: Index,
        index_style: Index,
        eval_f: Eval_F_CB,
        eval_g: Eval_G_CB,
        eval_grad_f: Eval_Grad_F_CB,
        eval_jac_g: Eval_Jac_G_CB,
        eval_h: Eval_H_CB,
    ) -> IpoptProblem;

    pub fn FreeIpoptProblem(ipopt_problem: IpoptProblem);

    pub fn AddIpoptStrOption(ipopt_problem: IpoptProblem, keyword: *const c_char, val: *const c_char) -> c_int;
    pub fn AddIpoptNumOption(ipopt_problem: IpoptProblem, keyword: *const c_char, val: Number) -> c_int;
    pub fn AddIpoptIntOption(ipopt_problem: IpoptProblem, keyword: *const c_char, val: Index) -> c_int;

    pub fn OpenIpoptOutputFile(ipopt_problem: IpoptProblem, file_name: *const c_char, print_level: c_int) -> c_int;

    pub fn SetIpoptProblemScaling(
        ipopt_problem: IpoptProblem,
        obj_scaling: Number,
        x_scaling: *const Number,
        g_scaling: *const Number,
    ) -> c_int;

    pub fn SetIntermediateCallback(ipopt_problem: IpoptProblem, intermediate_cb: Option<Intermediate_CB>) -> c_int;

    pub fn IpoptSolve(
        ipopt_problem: IpoptProblem,
        x: *mut Number,
        g: *mut Number,
        obj_val: *mut Number,
        mult_g: *mut Number,
        mult_x_L: *mut Number,
        mult_x_U: *mut Number,
        user_data: UserDataPtr,
    ) -> ApplicationReturnStatus;

    pub fn GetIpoptVersion(major: *mut c_int, minor: *mut c_int, release: *mut c_int);
}

/// Returns the linked IPOPT library's version as (major, minor, release).
pub fn ipopt_version() -> (i32, i32, i32) {
    let mut major = 0;
    let mut minor = 0;
    let mut release = 0;
    unsafe { GetIpoptVersion(&mut major, &mut minor, &mut release) };
    (major, minor, release)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_status_classifies_success() {
        assert!(ApplicationReturnStatus::SolveSucceeded.is_success());
        assert!(ApplicationReturnStatus::SolvedToAcceptableLevel.is_success());
        assert!(!ApplicationReturnStatus::MaximumIterationsExceeded.is_success());
        assert!(!ApplicationReturnStatus::InfeasibleProblemDetected.is_success());
    }
}
