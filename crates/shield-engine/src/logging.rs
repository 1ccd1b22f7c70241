//! Tracing setup and structured tick logging.

use tracing::{info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shield_models::{Event, EventType};

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON output; otherwise colored text. `RUST_LOG`
/// is honored on top of the default `shield=info` directive.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "shield=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Logger carrying the camera identity on every line.
#[derive(Debug, Clone)]
pub struct CameraLogger {
    camera_id: String,
}

impl CameraLogger {
    pub fn new(camera_id: impl Into<String>) -> Self {
        Self {
            camera_id: camera_id.into(),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// An event that starts a clip.
    pub fn log_triggered(&self, event: &Event) {
        warn!(
            camera_id = %self.camera_id,
            event_type = %event.event_type,
            confidence = event.confidence,
            "{} detected, recording clip",
            event.event_type
        );
    }

    /// An event observed during cooldown.
    pub fn log_suppressed(&self, event_type: EventType) {
        info!(
            camera_id = %self.camera_id,
            event_type = %event_type,
            "Event during cooldown, clip suppressed"
        );
    }

    /// A clip that could not be recorded.
    pub fn log_clip_failed(&self, event_type: EventType, error: &dyn std::fmt::Display) {
        warn!(
            camera_id = %self.camera_id,
            event_type = %event_type,
            error = %error,
            "Clip recording failed, continuing without clip"
        );
    }

    /// Span wrapping the engine's lifetime.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("camera", camera_id = %self.camera_id)
    }
}
