//! Reverse-mode automatic differentiation over [`algform_graph::NLGraph`].
//!
//! Given one representative graph (one per structural group, see
//! `algform-graph::hash`), [`tape::differentiate`] produces three new
//! graphs ready for `algform-codegen` to lower: the function itself, its
//! Jacobian (stacked sparse nonzeros), and the Hessian of the Lagrangian
//! (stacked sparse lower-triangular nonzeros).

pub mod error;
pub mod tape;

pub use error::{AutodiffError, AutodiffResult};
pub use tape::{differentiate, AutodiffArtifact, AutodiffStructure};
