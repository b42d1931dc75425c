use thiserror::Error;

pub type RbResult<T> = Result<T, RbError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RbError {
    #[error("Invalid term for compute_theta(): {term}")]
    InvalidTerm { term: String },

    #[error("Dimension mismatch: {what} (requested={requested}, available={available})")]
    DimensionMismatch {
        what: String,
        requested: usize,
        available: usize,
    },

    #[error("Unknown component '{component}' for problem {problem}")]
    UnknownComponent { problem: String, component: String },

    #[error("Dependency cycle detected: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error("Solver diverged: {what}")]
    SolverDivergence { what: String },

    #[error("Parameter mu not set for problem {problem}")]
    MissingParameter { problem: String },

    #[error("Theta length mismatch for term {term}: expected {expected}, got {actual}")]
    ThetaLength {
        term: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown problem: {what}")]
    UnknownProblem { what: String },

    #[error("Unknown expression: {name}")]
    UnknownExpression { name: String },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl RbError {
    pub fn invalid_arg(what: impl Into<String>) -> Self {
        RbError::InvalidArg { what: what.into() }
    }

    pub fn dimension(what: impl Into<String>, requested: usize, available: usize) -> Self {
        RbError::DimensionMismatch {
            what: what.into(),
            requested,
            available,
        }
    }
}
