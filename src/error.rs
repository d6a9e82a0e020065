//! Failure taxonomy for the engine.
//!
//! A step either fully succeeds or fails outright; there is no partial-failure
//! or retry path inside the engine.

use thiserror::Error;

/// Errors raised by the level-update rules and the stack orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// A covariance required for the covariance-increment computation cannot
    /// be inverted. Never recovered internally; the caller decides whether to
    /// abort the step, regularize, or halt the run.
    #[error("covariance is singular and cannot be inverted")]
    SingularMatrix,

    /// Operands whose shapes are mutually inconsistent (e.g. a vector
    /// hypothesis paired with a scalar covariance).
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A stack that cannot be advanced (too short, or mismatched driver
    /// inputs).
    #[error("invalid stack: {0}")]
    InvalidStack(String),
}

pub type StackResult<T> = Result<T, StackError>;
