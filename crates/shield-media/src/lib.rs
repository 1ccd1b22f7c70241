//! FFmpeg capture/encode wrapper and frame imaging.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - The [`FrameSource`] capability and an ffmpeg-backed camera/stream source
//! - Clip encoding from raw frames
//! - The alert marker overlay for event clips
//! - JPEG compression for live telemetry

pub mod command;
pub mod encode;
pub mod error;
pub mod jpeg;
pub mod overlay;
pub mod source;

pub use command::{check_ffmpeg, FfmpegCommand};
pub use encode::ClipEncoder;
pub use error::{MediaError, MediaResult};
pub use jpeg::{encode_jpeg, DEFAULT_JPEG_QUALITY};
pub use overlay::{alert_color, draw_alert_marker};
pub use source::{FfmpegSource, FrameSource, SourceConfig};
