//! Telemetry error types.

use thiserror::Error;

pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Transport failures. None of these are fatal; the channel backs off and
/// reconnects.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Not connected")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TelemetryError {
    pub fn is_closed(&self) -> bool {
        matches!(self, TelemetryError::Closed)
    }
}
