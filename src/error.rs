use thiserror::Error;

/// Trajectory evaluation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Insufficient overlap: {matched} timestamp matches, need at least {required}")]
    InsufficientOverlap { matched: usize, required: usize },

    #[error("Degenerate alignment: cross-covariance has rank {rank}")]
    DegenerateAlignment { rank: usize },

    #[error("No usable samples for metric {metric}")]
    EmptyMetricResult { metric: String },

    #[error("Cannot summarise an empty error sequence")]
    EmptySequence,

    #[error("Timestamp at index {index} ({current}) is not after the previous one ({previous})")]
    NonMonotonicTimestamps {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Invalid orientation at index {index}: quaternion has zero length")]
    InvalidOrientation { index: usize },

    #[error("Non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl EvalError {
    /// Re-tag a per-pose error with the pose's position in its sequence
    pub fn at_index(self, index: usize) -> Self {
        match self {
            EvalError::InvalidOrientation { .. } => EvalError::InvalidOrientation { index },
            EvalError::NonFiniteValue { .. } => EvalError::NonFiniteValue { index },
            other => other,
        }
    }
}

/// Result type for core evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;
