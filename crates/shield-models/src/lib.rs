//! Shared data models for the CrowdShield vision engine.
//!
//! This crate provides Serde-serializable types for:
//! - Captured frames
//! - Detector outputs and per-tick detector results
//! - Event classification
//! - Clip artifacts handed from the recorder to the uploader
//! - Telemetry message schemas

pub mod clip;
pub mod detection;
pub mod event;
pub mod frame;
pub mod telemetry;

// Re-export common types
pub use clip::{ClipArtifact, ClipMetadata, GeoLocation};
pub use detection::{Detection, DetectorKind, DetectorKindParseError, DetectorResult};
pub use event::{Event, EventType, EventTypeParseError};
pub use frame::{Frame, FrameError, BYTES_PER_PIXEL};
pub use telemetry::TelemetryMessage;
