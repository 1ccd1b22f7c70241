//! Error types for media operations.

use thiserror::Error;

use shield_models::FrameError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during capture, encoding and imaging.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    /// No device responded when the source was opened. Fatal at startup.
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single read failed on an otherwise working source.
    #[error("Frame read failed: {0}")]
    SourceRead(String),

    /// The clip sink could not be opened or the encoder failed.
    #[error("Clip encoding failed: {message}")]
    Encode {
        message: String,
        stderr: Option<String>,
    },

    #[error("Invalid frame: {0}")]
    InvalidFrame(#[from] FrameError),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl MediaError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    /// Create a source read error.
    pub fn source_read(message: impl Into<String>) -> Self {
        Self::SourceRead(message.into())
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
            stderr: None,
        }
    }

    /// Create an encode error carrying ffmpeg's stderr output.
    pub fn encode_with_stderr(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        Self::Encode {
            message: message.into(),
            stderr: (!stderr.trim().is_empty()).then_some(stderr),
        }
    }
}
