//! Prometheus metrics for the engine.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{EngineError, EngineResult};

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime. Without it every metric macro
/// is a no-op.
pub fn init_metrics(addr: SocketAddr) -> EngineResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| EngineError::config_error(format!("cannot start metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Orchestrator
    pub const TICKS_TOTAL: &str = "shield_ticks_total";
    pub const TICK_DURATION_SECONDS: &str = "shield_tick_duration_seconds";
    pub const EVENTS_TOTAL: &str = "shield_events_total";
    pub const EVENTS_SUPPRESSED_TOTAL: &str = "shield_events_suppressed_total";

    // Clips
    pub const CLIPS_RECORDED_TOTAL: &str = "shield_clips_recorded_total";
    pub const CLIPS_FAILED_TOTAL: &str = "shield_clips_failed_total";
    pub const CLIP_ENCODE_DURATION_SECONDS: &str = "shield_clip_encode_duration_seconds";

    // Capture
    pub const FRAMES_CAPTURED_TOTAL: &str = "shield_frames_captured_total";
    pub const SOURCE_READ_ERRORS_TOTAL: &str = "shield_source_read_errors_total";
    pub const RING_BUFFER_FRAMES: &str = "shield_ring_buffer_frames";

    // Owned by other crates, listed for dashboards
    pub use shield_detect::DETECTOR_FAILURES_TOTAL;
    pub use shield_storage::UPLOADS_TOTAL;
}
