//! Object detection for the vision engine.
//!
//! This crate provides:
//! - The [`Detector`] capability
//! - [`DetectorPool`], which fans a frame out to every detector concurrently
//! - [`HttpDetector`], a client for a remote inference service

pub mod detector;
pub mod error;
pub mod http;
pub mod pool;
pub mod types;

pub use detector::{detector_fn, Detector};
pub use error::{DetectResult, DetectorError};
pub use http::{HttpDetector, HttpDetectorConfig};
pub use pool::{DetectionThresholds, DetectorPool, DETECTOR_FAILURES_TOTAL};
pub use types::{DetectResponse, HealthResponse};
