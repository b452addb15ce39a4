//! Orchestration layer: [`model::NLPModel`] ties variables, constraints,
//! and NL groups together and drives IPOPT's callback protocol; the
//! [`adapter`] module exposes the same state through §6's closed
//! attribute enumeration; [`bridge`] rewrites cone/SOS constraints into
//! forms the wired-up NLP back-end can actually solve; [`autoload`]
//! discovers solver shared libraries at runtime.

pub mod adapter;
pub mod autoload;
pub mod bridge;
mod compile;
pub mod config;
pub mod error;
pub mod model;

pub use adapter::{AttrValue, ConstraintAttribute, ModelAttribute, VariableAttribute};
pub use bridge::ConstraintKind;
pub use config::{JitBackend, RawOptionValue, SolutionStatus, SolveOptions, TerminationStatus};
pub use error::{ModelError, ModelResult};
pub use model::{ConstraintHandle, NLPModel, ObjectiveSense};
