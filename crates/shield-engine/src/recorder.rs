//! Event clip recording.

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use tracing::info;

use shield_media::{draw_alert_marker, ClipEncoder, MediaError};
use shield_models::{ClipArtifact, ClipMetadata, Event, Frame, GeoLocation};
use shield_storage::RecordingsDir;

use crate::error::EngineResult;
use crate::metrics::names;

/// Turns a ring buffer snapshot into a durable clip.
#[async_trait]
pub trait ClipRecorder: Send + Sync {
    /// Record `frames` (oldest first) as the clip for `event`.
    async fn record(&self, frames: Vec<Frame>, event: &Event) -> EngineResult<ClipArtifact>;
}

/// Writes H.264 MP4 clips through ffmpeg into the recordings directory.
pub struct FfmpegClipRecorder {
    recordings: RecordingsDir,
    encoder: ClipEncoder,
    camera_id: String,
    location: GeoLocation,
}

impl FfmpegClipRecorder {
    pub fn new(
        recordings: RecordingsDir,
        encoder: ClipEncoder,
        camera_id: impl Into<String>,
        location: GeoLocation,
    ) -> Self {
        Self {
            recordings,
            encoder,
            camera_id: camera_id.into(),
            location,
        }
    }
}

#[async_trait]
impl ClipRecorder for FfmpegClipRecorder {
    async fn record(&self, mut frames: Vec<Frame>, event: &Event) -> EngineResult<ClipArtifact> {
        let last = frames
            .last_mut()
            .ok_or_else(|| MediaError::encode("no buffered frames"))?;
        *last = draw_alert_marker(last, event.event_type)?;

        let mut metadata = ClipMetadata::new(
            event.event_type,
            self.camera_id.clone(),
            self.location,
            Utc::now(),
        );
        metadata.fps = self.encoder.fps();

        self.recordings.ensure().await?;
        let path = self.recordings.clip_path(&metadata);

        let started = std::time::Instant::now();
        metadata.frame_count = self.encoder.encode(&frames, &path).await?;
        histogram!(names::CLIP_ENCODE_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        counter!(names::CLIPS_RECORDED_TOTAL, "event_type" => event.event_type.as_str()).increment(1);

        info!(
            event_type = %event.event_type,
            path = %path.display(),
            frames = metadata.frame_count,
            "Recorded {:.1}s clip",
            metadata.duration_secs()
        );
        Ok(ClipArtifact::new(path, metadata))
    }
}
