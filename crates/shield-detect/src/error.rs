//! Detector error types.

use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectorError>;

/// Failure of a single detector for a single frame.
///
/// Never fatal: the pool logs it and reports an empty detection list.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector failed: {0}")]
    Failed(String),

    #[error("Detector panicked: {0}")]
    Panicked(String),

    #[error("Detector timed out after {0} ms")]
    TimedOut(u64),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorError::Failed(_) => "failed",
            DetectorError::Panicked(_) => "panicked",
            DetectorError::TimedOut(_) => "timeout",
            DetectorError::RequestFailed(_) => "request",
            DetectorError::InvalidResponse(_) | DetectorError::Json(_) => "response",
            DetectorError::Network(_) => "network",
        }
    }
}
