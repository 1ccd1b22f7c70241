//! Clip artifacts produced for triggered events.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EventType;

/// Camera position reported alongside every clip.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Metadata describing a recorded clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipMetadata {
    /// Unique id, used to correlate recorder and uploader logs
    pub clip_id: Uuid,
    pub event_type: EventType,
    pub camera_id: String,
    pub location: GeoLocation,
    /// Trigger time; also encoded in the file name
    pub timestamp: DateTime<Utc>,
    /// Number of frames written
    pub frame_count: usize,
    /// Frame rate the clip was encoded at
    pub fps: u32,
}

impl ClipMetadata {
    pub fn new(
        event_type: EventType,
        camera_id: impl Into<String>,
        location: GeoLocation,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            clip_id: Uuid::new_v4(),
            event_type,
            camera_id: camera_id.into(),
            location,
            timestamp,
            frame_count: 0,
            fps: 0,
        }
    }

    /// File name for this clip: `{event_type}_{YYYYmmdd_HHMMSS}.mp4`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.mp4",
            self.event_type.as_str(),
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    /// Clip duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.fps == 0 {
            0.0
        } else {
            self.frame_count as f64 / self.fps as f64
        }
    }
}

/// A clip on durable local storage plus its metadata.
///
/// Created by the recorder and consumed by the uploader; the file stays on
/// disk after upload so an offline sweep can resend it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipArtifact {
    pub path: PathBuf,
    pub metadata: ClipMetadata,
}

impl ClipArtifact {
    pub fn new(path: impl Into<PathBuf>, metadata: ClipMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of the clip path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.metadata.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_encodes_event_and_time() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let meta = ClipMetadata::new(EventType::Fire, "cam1", GeoLocation::default(), ts);
        assert_eq!(meta.file_name(), "Fire_20240309_140507.mp4");
    }

    #[test]
    fn test_duration() {
        let mut meta =
            ClipMetadata::new(EventType::Stampede, "cam1", GeoLocation::default(), Utc::now());
        assert_eq!(meta.duration_secs(), 0.0);
        meta.frame_count = 150;
        meta.fps = 15;
        assert!((meta.duration_secs() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_artifact_file_name_uses_path() {
        let meta =
            ClipMetadata::new(EventType::Violence, "cam1", GeoLocation::default(), Utc::now());
        let artifact = ClipArtifact::new("/tmp/recordings/Violence_x.mp4", meta);
        assert_eq!(artifact.file_name(), "Violence_x.mp4");
    }
}
