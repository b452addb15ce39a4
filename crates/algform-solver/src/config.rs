//! Solve-time configuration and the post-solve status enums of the §6
//! attribute table: a small struct of common knobs (`max_iterations`,
//! `time_limit_sec`, `silent`) with a `Default` impl, generalized to the
//! NLP adapter's own option surface.

/// Which `algform-jit` back-end compiles each new group's evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitBackend {
    /// libtcc C-text compile: near-zero compile latency.
    #[default]
    Tcc,
    /// LLVM IR compile through `inkwell`'s MCJIT: slower to compile,
    /// optimizer passes run on the generated code.
    Llvm,
}

/// A raw, solver-native option override, keyed by the back-end's own
/// option name (e.g. `"tol"`, `"linear_solver"`).
#[derive(Debug, Clone)]
pub enum RawOptionValue {
    Int(i32),
    Num(f64),
    Str(String),
}

/// Typed surface behind the `TimeLimitSec`/`Silent`/`NumberOfThreads` model
/// attributes of §6, plus the JIT back-end choice (a per-model option, not
/// part of the attribute table).
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    pub time_limit_sec: Option<f64>,
    pub silent: bool,
    pub max_iterations: Option<i32>,
    pub jit_backend: JitBackend,
    pub raw_options: Vec<(String, RawOptionValue)>,
}

impl SolveOptions {
    pub fn new() -> Self {
        SolveOptions::default()
    }
}

/// Model attribute `TerminationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationStatus {
    #[default]
    OptimizeNotCalled,
    Optimal,
    Infeasible,
    DualInfeasible,
    InfeasibleOrUnbounded,
    LocallySolved,
    LocallyInfeasible,
    AlmostOptimal,
    IterationLimit,
    TimeLimit,
    NodeLimit,
    SolutionLimit,
    MemoryLimit,
    ObjectiveLimit,
    NumericalError,
    InvalidModel,
    InvalidOption,
    Interrupted,
    OtherError,
}

/// Model attributes `PrimalStatus`/`DualStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolutionStatus {
    #[default]
    NoSolution,
    FeasiblePoint,
    NearlyFeasiblePoint,
    InfeasiblePoint,
    InfeasibilityCertificate,
    Unknown,
}

/// Maps an IPOPT `SolveStatus` onto the abstract `TerminationStatus`/
/// `PrimalStatus`/`DualStatus` triple of §6. IPOPT itself does not
/// distinguish primal from dual infeasibility certificates as sharply as
/// the attribute table does, so both collapse to the same
/// `SolutionStatus` on the infeasible branches.
pub fn classify(status: algform_ipopt_sys::SolveStatus) -> (TerminationStatus, SolutionStatus, SolutionStatus) {
    use algform_ipopt_sys::SolveStatus as S;
    use SolutionStatus as Sol;
    use TerminationStatus as T;
    match status {
        S::SolveSucceeded => (T::Optimal, Sol::FeasiblePoint, Sol::FeasiblePoint),
        S::SolvedToAcceptableLevel => (T::AlmostOptimal, Sol::FeasiblePoint, Sol::FeasiblePoint),
        S::FeasiblePointFound => (T::LocallySolved, Sol::FeasiblePoint, Sol::Unknown),
        S::InfeasibleProblemDetected => (T::LocallyInfeasible, Sol::InfeasiblePoint, Sol::InfeasibilityCertificate),
        S::SearchDirectionBecomesTooSmall => (T::NumericalError, Sol::Unknown, Sol::Unknown),
        S::DivergingIterates => (T::InfeasibleOrUnbounded, Sol::Unknown, Sol::Unknown),
        S::UserRequestedStop => (T::Interrupted, Sol::Unknown, Sol::Unknown),
        S::MaximumIterationsExceeded => (T::IterationLimit, Sol::Unknown, Sol::Unknown),
        S::RestorationFailed => (T::NumericalError, Sol::Unknown, Sol::Unknown),
        S::ErrorInStepComputation => (T::NumericalError, Sol::Unknown, Sol::Unknown),
        S::MaximumCpuTimeExceeded => (T::TimeLimit, Sol::Unknown, Sol::Unknown),
        S::NotEnoughDegreesOfFreedom => (T::InvalidModel, Sol::Unknown, Sol::Unknown),
        S::InvalidProblemDefinition => (T::InvalidModel, Sol::NoSolution, Sol::NoSolution),
        S::InvalidOption => (T::InvalidOption, Sol::NoSolution, Sol::NoSolution),
        S::InvalidNumberDetected => (T::NumericalError, Sol::Unknown, Sol::Unknown),
        S::UnrecoverableException => (T::OtherError, Sol::Unknown, Sol::Unknown),
        S::NonIpoptExceptionThrown => (T::OtherError, Sol::Unknown, Sol::Unknown),
        S::InsufficientMemory => (T::MemoryLimit, Sol::Unknown, Sol::Unknown),
        S::InternalError => (T::OtherError, Sol::Unknown, Sol::Unknown),
    }
}
