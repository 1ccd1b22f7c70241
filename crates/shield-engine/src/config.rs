//! Engine configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shield_detect::{DetectionThresholds, HttpDetectorConfig};
use shield_media::SourceConfig;
use shield_models::GeoLocation;
use shield_storage::CollectorConfig;
use shield_telemetry::TelemetryConfig;

use crate::error::{EngineError, EngineResult};

/// Engine configuration.
///
/// Built once at startup and passed by reference into each component.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Camera identifier reported with every clip
    pub camera_id: String,
    /// Camera position reported with every clip
    pub location: GeoLocation,
    /// Capture input
    pub source: SourceConfig,
    /// Seconds of lead-up footage kept for clips
    pub buffer_seconds: u32,
    /// Minimum crowd detections that count as a stampede
    pub stampede_threshold: usize,
    /// Minimum time between two recorded clips
    pub event_cooldown: Duration,
    /// Per-detector confidence thresholds
    pub thresholds: DetectionThresholds,
    /// Whether the weapon slot is bound to a detector
    pub weapon_detector_enabled: bool,
    /// Inference service used by the detector slots
    pub detector: HttpDetectorConfig,
    /// Bound on each detector call
    pub detector_timeout: Duration,
    /// Live viewer connection
    pub telemetry: TelemetryConfig,
    /// JPEG quality of telemetry frames
    pub telemetry_jpeg_quality: u8,
    /// Incident collector
    pub collector: CollectorConfig,
    /// Where clips are written
    pub recordings_dir: PathBuf,
    /// Encoder quality (x264 CRF)
    pub clip_crf: u8,
    /// Bound on encoding a single clip
    pub clip_encode_timeout: Duration,
    /// Yield between ticks
    pub tick_interval: Duration,
    /// Wait when no new frame is available
    pub idle_interval: Duration,
    /// Wait after a failed frame read
    pub source_retry: Duration,
    /// Prometheus listener; `None` disables the exporter
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            camera_id: "cam1".to_string(),
            location: GeoLocation::default(),
            source: SourceConfig::default(),
            buffer_seconds: 10,
            stampede_threshold: 5,
            event_cooldown: Duration::from_secs(10),
            thresholds: DetectionThresholds::default(),
            weapon_detector_enabled: false,
            detector: HttpDetectorConfig::default(),
            detector_timeout: Duration::from_millis(5000),
            telemetry: TelemetryConfig::default(),
            telemetry_jpeg_quality: 80,
            collector: CollectorConfig::default(),
            recordings_dir: PathBuf::from("recordings"),
            clip_crf: 23,
            clip_encode_timeout: Duration::from_secs(60),
            tick_interval: Duration::from_millis(10),
            idle_interval: Duration::from_millis(100),
            source_retry: Duration::from_secs(1),
            metrics_addr: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let thresholds = DetectionThresholds {
            fight: env_or("FIGHT_CONF_THRESHOLD", defaults.thresholds.fight),
            fire: env_or("FIRE_CONF_THRESHOLD", defaults.thresholds.fire),
            crowd: env_or("CROWD_CONF_THRESHOLD", defaults.thresholds.crowd),
            weapon: env_or("WEAPON_CONF_THRESHOLD", defaults.thresholds.weapon),
        };

        let source = SourceConfig {
            input: std::env::var("CAMERA_INPUT").unwrap_or(defaults.source.input.clone()),
            input_format: match std::env::var("CAMERA_FORMAT") {
                Ok(format) if format.is_empty() => None,
                Ok(format) => Some(format),
                Err(_) => defaults.source.input_format.clone(),
            },
            width: env_or("FRAME_WIDTH", defaults.source.width),
            height: env_or("FRAME_HEIGHT", defaults.source.height),
            fps: env_or("TARGET_FPS", defaults.source.fps),
            read_timeout: Duration::from_millis(env_or("SOURCE_READ_TIMEOUT_MS", 5000)),
            ..defaults.source.clone()
        };

        Self {
            camera_id: std::env::var("CAMERA_ID").unwrap_or_else(|_| "cam1".to_string()),
            location: GeoLocation::new(env_or("LATITUDE", 0.0), env_or("LONGITUDE", 0.0)),
            source,
            buffer_seconds: env_or("BUFFER_SECONDS", 10),
            stampede_threshold: env_or("STAMPEDE_THRESHOLD", 5),
            event_cooldown: Duration::from_secs(env_or("EVENT_COOLDOWN_SECS", 10)),
            thresholds,
            weapon_detector_enabled: env_or("WEAPON_DETECTOR_ENABLED", false),
            detector: HttpDetectorConfig::from_env(),
            detector_timeout: Duration::from_millis(env_or("DETECTOR_TIMEOUT_MS", 5000)),
            telemetry: TelemetryConfig::from_env(),
            telemetry_jpeg_quality: env_or("TELEMETRY_JPEG_QUALITY", 80),
            collector: CollectorConfig::from_env(),
            recordings_dir: std::env::var("RECORDINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.recordings_dir),
            clip_crf: env_or("CLIP_CRF", defaults.clip_crf),
            clip_encode_timeout: Duration::from_secs(env_or("CLIP_ENCODE_TIMEOUT_SECS", 60)),
            tick_interval: Duration::from_millis(env_or("TICK_INTERVAL_MS", 10)),
            idle_interval: Duration::from_millis(env_or("IDLE_INTERVAL_MS", 100)),
            source_retry: Duration::from_secs(env_or("SOURCE_RETRY_SECS", 1)),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Ring buffer capacity: `fps * buffer_seconds` frames.
    pub fn buffer_capacity(&self) -> usize {
        self.source.fps as usize * self.buffer_seconds as usize
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.source.fps == 0 {
            return Err(EngineError::config_error("TARGET_FPS must be positive"));
        }
        if self.buffer_seconds == 0 {
            return Err(EngineError::config_error("BUFFER_SECONDS must be positive"));
        }
        if self.stampede_threshold == 0 {
            return Err(EngineError::config_error("STAMPEDE_THRESHOLD must be positive"));
        }
        // Clip names carry a one-second timestamp.
        if self.event_cooldown < Duration::from_secs(1) {
            return Err(EngineError::config_error(
                "EVENT_COOLDOWN_SECS must be at least 1",
            ));
        }
        if self.clip_crf > 51 {
            return Err(EngineError::config_error("CLIP_CRF must be within [0, 51]"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(EngineError::config_error("frame size must be positive"));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("FIGHT_CONF_THRESHOLD", t.fight),
            ("FIRE_CONF_THRESHOLD", t.fire),
            ("CROWD_CONF_THRESHOLD", t.crowd),
            ("WEAPON_CONF_THRESHOLD", t.weapon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::config_error(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}
