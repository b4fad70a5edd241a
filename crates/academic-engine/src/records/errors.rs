use super::repository::RepositoryError;

/// Input rejected before any write.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown attempt value '{0}' (expected first, supplementary, retake or special)")]
    UnknownAttempt(String),
    #[error("{field} of {value} exceeds the maximum of {maximum}")]
    ScoreOutOfRange {
        field: &'static str,
        value: f64,
        maximum: f64,
    },
    #[error("{field} must not be negative (found {value})")]
    NegativeScore { field: &'static str, value: f64 },
    #[error("missing {0}")]
    MissingReference(&'static str),
}

/// Error raised by the grading and progression services.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RecordsError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
