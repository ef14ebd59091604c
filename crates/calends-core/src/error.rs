//! Core error types.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the pure calendar computations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The recurrence rule cannot be expanded.
    #[error("malformed recurrence rule: {reason}")]
    MalformedRule { reason: String },
}

impl CoreError {
    /// Creates a malformed rule error.
    pub fn malformed_rule(reason: impl Into<String>) -> Self {
        Self::MalformedRule {
            reason: reason.into(),
        }
    }
}
