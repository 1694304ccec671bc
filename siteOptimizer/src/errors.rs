use thiserror::Error;
use crate::models::optimization_result::OptimizationResult;

pub type SiteResult<T> = Result<T, SiteError>;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("constraint violation: {reason} ({} stores selected)", .partial.selected.len())]
    ConstraintViolation {
        reason: String,
        partial: Box<OptimizationResult>,
    },

    #[error("timed out after {} iterations with {} stores selected", .partial.iterations.len(), .partial.selected.len())]
    Timeout { partial: Box<OptimizationResult> },

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SiteError {
    /// Best-known result carried by a timeout or constraint failure.
    pub fn partial_result(&self) -> Option<&OptimizationResult> {
        match self {
            SiteError::Timeout { partial } | SiteError::ConstraintViolation { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub fn into_partial_result(self) -> Option<OptimizationResult> {
        match self {
            SiteError::Timeout { partial } | SiteError::ConstraintViolation { partial, .. } => Some(*partial),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SiteError::Timeout { .. })
    }
}
