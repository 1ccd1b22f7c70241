//! Engine error types.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] shield_media::MediaError),

    #[error("Detector error: {0}")]
    Detector(#[from] shield_detect::DetectorError),

    #[error("Storage error: {0}")]
    Storage(#[from] shield_storage::StorageError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] shield_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the engine cannot keep running after this error.
    ///
    /// Only an unusable camera at startup is fatal; everything else degrades
    /// the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::ConfigError(_)
                | EngineError::Media(shield_media::MediaError::SourceUnavailable(_))
                | EngineError::Media(shield_media::MediaError::FfmpegNotFound)
        )
    }
}
