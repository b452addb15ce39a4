//! Safe Rust wrapper over the raw IPOPT C interface.
//!
//! `BasicProblem`/`ConstrainedProblem` mirror the callback shape IPOPT
//! itself expects; `algform-solver::model::NLPModel` is the one
//! implementor, dispatching into the JIT-compiled objective/constraint
//! functions produced by `algform-jit`.

use crate::{
    AddIpoptIntOption, AddIpoptNumOption, AddIpoptStrOption, ApplicationReturnStatus, CreateIpoptProblem,
    FreeIpoptProblem, Index, IpoptProblem, IpoptSolve, Number, UserDataPtr,
};
use std::ffi::CString;
use std::os::raw::c_int;

/// Basic NLP problem structure: variable count, bounds, initial point,
/// objective and its gradient.
pub trait BasicProblem {
    fn num_variables(&self) -> usize;

    /// Use large values (e.g. 1e20) for unbounded variables.
    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool;

    fn initial_point(&self, x: &mut [Number]) -> bool;

    fn objective(&self, x: &[Number], new_x: bool, obj: &mut Number) -> bool;

    fn objective_grad(&self, x: &[Number], new_x: bool, grad_f: &mut [Number]) -> bool;
}

/// Adds constraints, their Jacobian, and the Hessian of the Lagrangian.
pub trait ConstrainedProblem: BasicProblem {
    fn num_constraints(&self) -> usize;

    fn num_constraint_jacobian_non_zeros(&self) -> usize;

    /// Equality g(x) = 0 is expressed as g_l = g_u = 0; inequality
    /// g(x) <= 0 as g_l = -inf, g_u = 0.
    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool;

    fn constraint(&self, x: &[Number], new_x: bool, g: &mut [Number]) -> bool;

    fn constraint_jacobian_indices(&self, irow: &mut [Index], jcol: &mut [Index]) -> bool;

    fn constraint_jacobian_values(&self, x: &[Number], new_x: bool, vals: &mut [Number]) -> bool;

    /// Only the lower triangle is stored; the Hessian is symmetric.
    fn num_hessian_non_zeros(&self) -> usize;

    fn hessian_indices(&self, irow: &mut [Index], jcol: &mut [Index]) -> bool;

    /// Computes sigma * grad^2 f(x) + sum_i lambda_i * grad^2 g_i(x).
    fn hessian_values(
        &self,
        x: &[Number],
        new_x: bool,
        obj_factor: Number,
        lambda: &[Number],
        vals: &mut [Number],
    ) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    SolveSucceeded,
    SolvedToAcceptableLevel,
    InfeasibleProblemDetected,
    SearchDirectionBecomesTooSmall,
    DivergingIterates,
    UserRequestedStop,
    FeasiblePointFound,
    MaximumIterationsExceeded,
    RestorationFailed,
    ErrorInStepComputation,
    MaximumCpuTimeExceeded,
    NotEnoughDegreesOfFreedom,
    InvalidProblemDefinition,
    InvalidOption,
    InvalidNumberDetected,
    UnrecoverableException,
    NonIpoptExceptionThrown,
    InsufficientMemory,
    InternalError,
}

impl From<ApplicationReturnStatus> for SolveStatus {
    fn from(status: ApplicationReturnStatus) -> Self {
        match status {
            ApplicationReturnStatus::SolveSucceeded => SolveStatus::SolveSucceeded,
            ApplicationReturnStatus::SolvedToAcceptableLevel => SolveStatus::SolvedToAcceptableLevel,
            ApplicationReturnStatus::InfeasibleProblemDetected => SolveStatus::InfeasibleProblemDetected,
            ApplicationReturnStatus::SearchDirectionBecomesTooSmall => SolveStatus::SearchDirectionBecomesTooSmall,
            ApplicationReturnStatus::DivergingIterates => SolveStatus::DivergingIterates,
            ApplicationReturnStatus::UserRequestedStop => SolveStatus::UserRequestedStop,
            ApplicationReturnStatus::FeasiblePointFound => SolveStatus::FeasiblePointFound,
            ApplicationReturnStatus::MaximumIterationsExceeded => SolveStatus::MaximumIterationsExceeded,
            ApplicationReturnStatus::RestorationFailed => SolveStatus::RestorationFailed,
            ApplicationReturnStatus::ErrorInStepComputation => SolveStatus::ErrorInStepComputation,
            ApplicationReturnStatus::MaximumCpuTimeExceeded => SolveStatus::MaximumCpuTimeExceeded,
            ApplicationReturnStatus::MaximumWallTimeExceeded => SolveStatus::MaximumCpuTimeExceeded,
            ApplicationReturnStatus::NotEnoughDegreesOfFreedom => SolveStatus::NotEnoughDegreesOfFreedom,
            ApplicationReturnStatus::InvalidProblemDefinition => SolveStatus::InvalidProblemDefinition,
            ApplicationReturnStatus::InvalidOption => SolveStatus::InvalidOption,
            ApplicationReturnStatus::InvalidNumberDetected => SolveStatus::InvalidNumberDetected,
            ApplicationReturnStatus::UnrecoverableException => SolveStatus::UnrecoverableException,
            ApplicationReturnStatus::NonIpoptExceptionThrown => SolveStatus::NonIpoptExceptionThrown,
            ApplicationReturnStatus::InsufficientMemory => SolveStatus::InsufficientMemory,
            ApplicationReturnStatus::InternalError => SolveStatus::InternalError,
        }
    }
}

pub struct Solution {
    pub primal_variables: Vec<Number>,
    pub constraint_values: Vec<Number>,
    pub constraint_multipliers: Vec<Number>,
    pub lower_bound_multipliers: Vec<Number>,
    pub upper_bound_multipliers: Vec<Number>,
}

pub struct SolverData {
    pub solution: Solution,
}

pub struct SolveResult {
    pub status: SolveStatus,
    pub objective_value: Number,
    pub solver_data: SolverData,
}

/// Owns an IPOPT problem handle plus the boxed user problem the
/// callback trampolines dereference via `user_data`.
pub struct Ipopt<P: ConstrainedProblem> {
    problem: IpoptProblem,
    user_problem: Box<P>,
    n: usize,
    m: usize,
}

impl<P: ConstrainedProblem> Ipopt<P> {
    pub fn new(problem: P) -> Result<Self, String> {
        let n = problem.num_variables();
        let m = problem.num_constraints();
        let nele_jac = problem.num_constraint_jacobian_non_zeros();
        let nele_hess = problem.num_hessian_non_zeros();

        let mut x_l = vec![0.0; n];
        let mut x_u = vec![0.0; n];
        if !problem.bounds(&mut x_l, &mut x_u) {
            return Err("failed to get variable bounds".to_string());
        }

        let mut g_l = vec![0.0; m];
        let mut g_u = vec![0.0; m];
        if !problem.constraint_bounds(&mut g_l, &mut g_u) {
            return Err("failed to get constraint bounds".to_string());
        }

        let user_problem = Box::new(problem);

        let ipopt_problem = unsafe {
            CreateIpoptProblem(
                n as Index,
                x_l.as_ptr(),
                x_u.as_ptr(),
                m as Index,
                g_l.as_ptr(),
                g_u.as_ptr(),
                nele_jac as Index,
                nele_hess as Index,
                0, // C-style indexing
                eval_f_callback::<P>,
                eval_g_callback::<P>,
                eval_grad_f_callback::<P>,
                eval_jac_g_callback::<P>,
                eval_h_callback::<P>,
            )
        };

        if ipopt_problem.is_null() {
            return Err("failed to create IPOPT problem".to_string());
        }

        Ok(Ipopt { problem: ipopt_problem, user_problem, n, m })
    }

    /// Generic option setter dispatching on the value's type.
    ///
    /// ```ignore
    /// solver.set_option("max_iter", 100);
    /// solver.set_option("tol", 1e-6);
    /// solver.set_option("linear_solver", "mumps");
    /// ```
    pub fn set_option<V: IpoptOption>(&mut self, name: &str, value: V) {
        value.set_option(self, name);
    }

    pub fn set_string_option(&mut self, name: &str, value: &str) {
        let name_c = CString::new(name).unwrap();
        let value_c = CString::new(value).unwrap();
        unsafe {
            AddIpoptStrOption(self.problem, name_c.as_ptr(), value_c.as_ptr());
        }
    }

    pub fn set_int_option(&mut self, name: &str, value: i32) {
        let name_c = CString::new(name).unwrap();
        unsafe {
            AddIpoptIntOption(self.problem, name_c.as_ptr(), value);
        }
    }

    pub fn set_num_option(&mut self, name: &str, value: f64) {
        let name_c = CString::new(name).unwrap();
        unsafe {
            AddIpoptNumOption(self.problem, name_c.as_ptr(), value);
        }
    }

    pub fn solve(self) -> SolveResult {
        let n = self.n;
        let m = self.m;

        let mut x = vec![0.0; n];
        let mut g = vec![0.0; m];
        let mut mult_g = vec![0.0; m];
        let mut mult_x_l = vec![0.0; n];
        let mut mult_x_u = vec![0.0; n];
        let mut obj_val = 0.0;

        if !self.user_problem.initial_point(&mut x) {
            return SolveResult {
                status: SolveStatus::InvalidProblemDefinition,
                objective_value: f64::NAN,
                solver_data: SolverData {
                    solution: Solution {
                        primal_variables: x,
                        constraint_values: g,
                        constraint_multipliers: mult_g,
                        lower_bound_multipliers: mult_x_l,
                        upper_bound_multipliers: mult_x_u,
                    },
                },
            };
        }

        let user_data = self.user_problem.as_ref() as *const P as UserDataPtr;

        let status = unsafe {
            IpoptSolve(
                self.problem,
                x.as_mut_ptr(),
                g.as_mut_ptr(),
                &mut obj_val,
                mult_g.as_mut_ptr(),
                mult_x_l.as_mut_ptr(),
                mult_x_u.as_mut_ptr(),
                user_data,
            )
        };

        SolveResult {
            status: status.into(),
            objective_value: obj_val,
            solver_data: SolverData {
                solution: Solution {
                    primal_variables: x,
                    constraint_values: g,
                    constraint_multipliers: mult_g,
                    lower_bound_multipliers: mult_x_l,
                    upper_bound_multipliers: mult_x_u,
                },
            },
        }
    }
}

impl<P: ConstrainedProblem> Drop for Ipopt<P> {
    fn drop(&mut self) {
        if !self.problem.is_null() {
            unsafe {
                FreeIpoptProblem(self.problem);
            }
        }
    }
}

unsafe impl<P: ConstrainedProblem> Send for Ipopt<P> {}

pub trait IpoptOption {
    fn set_option<P: ConstrainedProblem>(&self, solver: &mut Ipopt<P>, name: &str);
}

impl IpoptOption for i32 {
    fn set_option<P: ConstrainedProblem>(&self, solver: &mut Ipopt<P>, name: &str) {
        solver.set_int_option(name, *self);
    }
}

impl IpoptOption for f64 {
    fn set_option<P: ConstrainedProblem>(&self, solver: &mut Ipopt<P>, name: &str) {
        solver.set_num_option(name, *self);
    }
}

impl IpoptOption for &str {
    fn set_option<P: ConstrainedProblem>(&self, solver: &mut Ipopt<P>, name: &str) {
        solver.set_string_option(name, self);
    }
}

/// Bounds slice creation from FFI-supplied sizes against a runaway or
/// corrupted `n`/`m`/`nele_*` value.
const MAX_PROBLEM_SIZE: usize = 10_000_000;

extern "C" fn eval_f_callback<P: ConstrainedProblem>(
    n: Index,
    x: *const Number,
    new_x: c_int,
    obj_value: *mut Number,
    user_data: UserDataPtr,
) -> c_int {
    if user_data.is_null() || x.is_null() || obj_value.is_null() {
        return 0;
    }
    let n_usize = n as usize;
    if n < 0 || n_usize > MAX_PROBLEM_SIZE {
        return 0;
    }

    let problem = unsafe { &*(user_data as *const P) };
    let x_slice = unsafe { std::slice::from_raw_parts(x, n_usize) };
    let mut obj = 0.0;
    if problem.objective(x_slice, new_x != 0, &mut obj) {
        unsafe { *obj_value = obj };
        1
    } else {
        0
    }
}

extern "C" fn eval_grad_f_callback<P: ConstrainedProblem>(
    n: Index,
    x: *const Number,
    new_x: c_int,
    grad_f: *mut Number,
    user_data: UserDataPtr,
) -> c_int {
    if user_data.is_null() || x.is_null() || grad_f.is_null() {
        return 0;
    }
    let n_usize = n as usize;
    if n < 0 || n_usize > MAX_PROBLEM_SIZE {
        return 0;
    }

    let problem = unsafe { &*(user_data as *const P) };
    let x_slice = unsafe { std::slice::from_raw_parts(x, n_usize) };
    let grad_slice = unsafe { std::slice::from_raw_parts_mut(grad_f, n_usize) };
    if problem.objective_grad(x_slice, new_x != 0, grad_slice) {
        1
    } else {
        0
    }
}

extern "C" fn eval_g_callback<P: ConstrainedProblem>(
    n: Index,
    x: *const Number,
    new_x: c_int,
    m: Index,
    g: *mut Number,
    user_data: UserDataPtr,
) -> c_int {
    if user_data.is_null() || x.is_null() || g.is_null() {
        return 0;
    }
    let n_usize = n as usize;
    let m_usize = m as usize;
    if n < 0 || n_usize > MAX_PROBLEM_SIZE || m < 0 || m_usize > MAX_PROBLEM_SIZE {
        return 0;
    }

    let problem = unsafe { &*(user_data as *const P) };
    let x_slice = unsafe { std::slice::from_raw_parts(x, n_usize) };
    let g_slice = unsafe { std::slice::from_raw_parts_mut(g, m_usize) };
    if problem.constraint(x_slice, new_x != 0, g_slice) {
        1
    } else {
        0
    }
}

extern "C" fn eval_jac_g_callback<P: ConstrainedProblem>(
    n: Index,
    x: *const Number,
    new_x: c_int,
    _m: Index,
    nele_jac: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> c_int {
    if user_data.is_null() {
        return 0;
    }
    let nnz = nele_jac as usize;
    let n_usize = n as usize;
    if nele_jac < 0 || nnz > MAX_PROBLEM_SIZE || n < 0 || n_usize > MAX_PROBLEM_SIZE {
        return 0;
    }

    let problem = unsafe { &*(user_data as *const P) };

    if values.is_null() {
        if iRow.is_null() || jCol.is_null() {
            return 0;
        }
        let irow_slice = unsafe { std::slice::from_raw_parts_mut(iRow, nnz) };
        let jcol_slice = unsafe { std::slice::from_raw_parts_mut(jCol, nnz) };
        if problem.constraint_jacobian_indices(irow_slice, jcol_slice) {
            1
        } else {
            0
        }
    } else {
        if x.is_null() {
            return 0;
        }
        let x_slice = unsafe { std::slice::from_raw_parts(x, n_usize) };
        let vals_slice = unsafe { std::slice::from_raw_parts_mut(values, nnz) };
        if problem.constraint_jacobian_values(x_slice, new_x != 0, vals_slice) {
            1
        } else {
            0
        }
    }
}

extern "C" fn eval_h_callback<P: ConstrainedProblem>(
    n: Index,
    x: *const Number,
    new_x: c_int,
    obj_factor: Number,
    m: Index,
    lambda: *const Number,
    _new_lambda: c_int,
    nele_hess: Index,
    iRow: *mut Index,
    jCol: *mut Index,
    values: *mut Number,
    user_data: UserDataPtr,
) -> c_int {
    if user_data.is_null() {
        return 0;
    }

    let n_usize = n as usize;
    let m_usize = m as usize;
    let nnz = nele_hess as usize;
    if n < 0 || m < 0 || nele_hess < 0 {
        return 0;
    }
    if n_usize > MAX_PROBLEM_SIZE || m_usize > MAX_PROBLEM_SIZE || nnz > MAX_PROBLEM_SIZE {
        return 0;
    }

    let problem = unsafe { &*(user_data as *const P) };

    if values.is_null() {
        if iRow.is_null() || jCol.is_null() {
            return 0;
        }
        let irow_slice = unsafe { std::slice::from_raw_parts_mut(iRow, nnz) };
        let jcol_slice = unsafe { std::slice::from_raw_parts_mut(jCol, nnz) };
        if problem.hessian_indices(irow_slice, jcol_slice) {
            1
        } else {
            0
        }
    } else {
        if x.is_null() || lambda.is_null() {
            return 0;
        }
        let x_slice = unsafe { std::slice::from_raw_parts(x, n_usize) };
        let lambda_slice = unsafe { std::slice::from_raw_parts(lambda, m_usize) };
        let vals_slice = unsafe { std::slice::from_raw_parts_mut(values, nnz) };
        if problem.hessian_values(x_slice, new_x != 0, obj_factor, lambda_slice, vals_slice) {
            1
        } else {
            0
        }
    }
}
