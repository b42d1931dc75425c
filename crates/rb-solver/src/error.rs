//! Error types for solver operations.

use rb_core::RbError;
use thiserror::Error;

/// Errors that can occur during an algebraic solve.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },

    #[error("Numeric error: {what}")]
    Numeric { what: String },

    /// Failure raised by a residual or Jacobian callback.
    #[error(transparent)]
    Callback(#[from] RbError),
}

pub type SolverResult<T> = Result<T, SolverError>;

impl From<SolverError> for RbError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::ProblemSetup { what } => RbError::InvalidArg { what },
            SolverError::ConvergenceFailed { what } => RbError::SolverDivergence { what },
            SolverError::Numeric { what } => RbError::SolverDivergence { what },
            SolverError::Callback(inner) => inner,
        }
    }
}
