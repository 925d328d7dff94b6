use thiserror::Error;

/// Validation failures on the task model and scoring configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("title cannot be empty")]
    EmptyTitle,

    #[error("task {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("estimated hours must be within 0..=16, got {0}")]
    EstimateOutOfRange(f64),

    #[error("confidence must be within 0.0..=1.0, got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("scoring weights must sum to 1.0, got {0}")]
    InvalidWeights(f64),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Failures reported by a [`crate::store::TaskStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("several tasks match '{prefix}': {}", .matches.join(", "))]
    Ambiguous { prefix: String, matches: Vec<String> },

    #[error(transparent)]
    Invalid(#[from] TaskError),
}
