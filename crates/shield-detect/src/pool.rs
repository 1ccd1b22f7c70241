//! Concurrent detector pool.
//!
//! Every configured detector runs against the same frame on its own blocking
//! worker; `detect_all` returns only once all of them have finished, failed
//! or timed out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use metrics::counter;
use tracing::{debug, warn};

use shield_models::{Detection, DetectorKind, DetectorResult, Frame};

use crate::detector::Detector;
use crate::error::{DetectResult, DetectorError};

/// Counter of detector calls that degraded to an empty result.
pub const DETECTOR_FAILURES_TOTAL: &str = "shield_detector_failures_total";

/// Minimum confidence per detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    pub fight: f32,
    pub fire: f32,
    pub crowd: f32,
    pub weapon: f32,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            fight: 0.75,
            fire: 0.40,
            crowd: 0.50,
            weapon: 0.65,
        }
    }
}

impl DetectionThresholds {
    pub fn for_kind(&self, kind: DetectorKind) -> f32 {
        match kind {
            DetectorKind::Fight => self.fight,
            DetectorKind::Fire => self.fire,
            DetectorKind::Crowd => self.crowd,
            DetectorKind::Weapon => self.weapon,
        }
    }
}

struct DetectorSlot {
    kind: DetectorKind,
    detector: Arc<dyn Detector>,
}

/// Holds the configured detectors and fans each frame out to all of them.
pub struct DetectorPool {
    slots: Vec<DetectorSlot>,
    timeout: Duration,
}

impl DetectorPool {
    /// Create an empty pool. `timeout` bounds each detector call.
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Vec::new(),
            timeout,
        }
    }

    /// Register a detector for a slot, replacing any previous one.
    pub fn with_detector(mut self, kind: DetectorKind, detector: Arc<dyn Detector>) -> Self {
        self.slots.retain(|slot| slot.kind != kind);
        self.slots.push(DetectorSlot { kind, detector });
        self
    }

    /// Configured detector slots, in registration order.
    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.slots.iter().map(|slot| slot.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every detector against `frame` and collect all outputs.
    ///
    /// A detector that errors, panics or exceeds the pool timeout contributes
    /// an empty list; it never affects the others.
    pub async fn detect_all(&self, frame: &Frame, thresholds: &DetectionThresholds) -> DetectorResult {
        let started = Instant::now();

        let calls = self.slots.iter().map(|slot| {
            let kind = slot.kind;
            let threshold = thresholds.for_kind(kind);
            let detector = Arc::clone(&slot.detector);
            let frame = frame.clone();
            async move { (kind, run_detector(detector, frame, threshold, self.timeout).await) }
        });

        let mut result = DetectorResult::new();
        for (kind, outcome) in join_all(calls).await {
            match outcome {
                Ok(detections) => result.insert(kind, detections),
                Err(e) => {
                    warn!(detector = %kind, error = %e, "Detector failed, using empty result");
                    counter!(
                        DETECTOR_FAILURES_TOTAL,
                        "detector" => kind.as_str(),
                        "reason" => e.kind()
                    )
                    .increment(1);
                    result.insert(kind, Vec::new());
                }
            }
        }

        debug!(
            frame = frame.seq(),
            detections = result.total(),
            "Detector pool finished in {:?}",
            started.elapsed()
        );
        result
    }
}

/// Run one detector call on a blocking worker, bounded by `timeout`.
async fn run_detector(
    detector: Arc<dyn Detector>,
    frame: Frame,
    threshold: f32,
    timeout: Duration,
) -> DetectResult<Vec<Detection>> {
    let handle = tokio::task::spawn_blocking(move || detector.detect(&frame, threshold));

    // On timeout the worker keeps running until the detector returns; its
    // output is discarded.
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(DetectorError::Panicked(join_error.to_string())),
        Err(_) => Err(DetectorError::TimedOut(timeout.as_millis() as u64)),
    }
}
