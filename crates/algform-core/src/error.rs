//! Error types for the symbolic expression core.

use thiserror::Error;

/// Errors raised while building or canonicalizing expression values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A multiplication or other combination would produce a polynomial of
    /// degree > 2 and no expression-graph context was active to absorb it.
    #[error("degree exceeded: result would have degree {degree}, no graph context active")]
    DegreeExceeded { degree: u8 },

    /// Division where the divisor is not a constant.
    #[error("cannot divide by a non-constant expression")]
    NonLinearDivide,

    /// Attribute access or deletion on a handle the indexer does not know.
    #[error("unknown or deleted handle: {0}")]
    UnknownHandle(u32),

    /// tupledict keys did not all have the same tuple length.
    #[error("the length of keys in tupledict is not consistent")]
    InconsistentKeyLength,

    /// `select` was called with a different number of keys than the
    /// tupledict's key arity.
    #[error("too many keys for tupledict with {arity}-tuple keys")]
    TooManyKeys { arity: usize },
}

/// Result alias for `algform-core` operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_exceeded_message() {
        let err = CoreError::DegreeExceeded { degree: 3 };
        assert!(err.to_string().contains("degree 3"));
    }

    #[test]
    fn unknown_handle_message() {
        let err = CoreError::UnknownHandle(42);
        assert!(err.to_string().contains("42"));
    }
}
