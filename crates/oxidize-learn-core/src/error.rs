use thiserror::Error;

/// Error type shared by every oxidize-learn crate.
///
/// Programmer errors (zero-sized matrices, negative lambda, querying
/// normalization statistics too early) panic instead; these variants cover
/// failures a caller is expected to check.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LearnError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Singular matrix: cannot invert or decompose")]
    SingularMatrix,

    #[error("Buffer preparation callback reported failure")]
    PreparationFailed,

    #[error("Matrix has no output vector")]
    MissingOutputVector,

    #[error("Delegate does not expose a design matrix")]
    MissingDesignMatrix,

    #[error("Solver did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Background task panicked")]
    TaskPanicked,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type LearnResult<T> = Result<T, LearnError>;
