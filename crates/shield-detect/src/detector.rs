//! The detector capability.

use shield_models::{Detection, Frame};

use crate::error::DetectResult;

/// A black-box detector: one frame in, zero or more detections out.
///
/// Calls are blocking and may be slow; the pool runs each one on a blocking
/// worker. Implementations must be safe to call concurrently with other
/// detectors on the same frame and must not block indefinitely. Any model
/// state is internal.
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
    /// Detect objects with at least `confidence_threshold` confidence.
    fn detect(&self, frame: &Frame, confidence_threshold: f32) -> DetectResult<Vec<Detection>>;
}

impl<F> Detector for F
where
    F: Fn(&Frame, f32) -> DetectResult<Vec<Detection>> + Send + Sync,
{
    fn detect(&self, frame: &Frame, confidence_threshold: f32) -> DetectResult<Vec<Detection>> {
        self(frame, confidence_threshold)
    }
}

/// Wrap a closure as a shared detector.
pub fn detector_fn<F>(f: F) -> std::sync::Arc<dyn Detector>
where
    F: Fn(&Frame, f32) -> DetectResult<Vec<Detection>> + Send + Sync + 'static,
{
    std::sync::Arc::new(f)
}
