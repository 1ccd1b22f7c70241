//! Engine wiring: capture task, orchestrator and shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use shield_detect::{DetectorPool, HttpDetector};
use shield_media::{ClipEncoder, FrameSource};
use shield_models::DetectorKind;
use shield_storage::{CollectorClient, RecordingsDir, Uploader};
use shield_telemetry::TelemetryChannel;

use crate::capture::{CaptureLoop, CaptureStats};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::mailbox::latest_frame;
use crate::orchestrator::{Orchestrator, Pipeline};
use crate::recorder::FfmpegClipRecorder;
use crate::ring_buffer::RingBuffer;

/// Build the production pipeline: HTTP detectors, ffmpeg recorder,
/// multipart uploader and WebSocket telemetry.
///
/// Must be called from within a Tokio runtime.
pub fn build_pipeline(config: &EngineConfig) -> EngineResult<Pipeline> {
    let mut kinds = vec![DetectorKind::Fight, DetectorKind::Fire, DetectorKind::Crowd];
    if config.weapon_detector_enabled {
        kinds.push(DetectorKind::Weapon);
    }

    let mut pool = DetectorPool::new(config.detector_timeout);
    for kind in kinds {
        let detector = HttpDetector::new(kind, config.detector.clone())?;
        pool = pool.with_detector(kind, Arc::new(detector));
    }

    let recorder = FfmpegClipRecorder::new(
        RecordingsDir::new(&config.recordings_dir),
        ClipEncoder::new(config.source.fps)
            .with_crf(config.clip_crf)
            .with_timeout(config.clip_encode_timeout),
        config.camera_id.clone(),
        config.location,
    );
    let uploader = Uploader::new(Arc::new(CollectorClient::new(config.collector.clone())?));

    Ok(Pipeline {
        pool,
        recorder: Arc::new(recorder),
        uploader,
        telemetry: Box::new(TelemetryChannel::new(config.telemetry.clone())),
    })
}

/// The running engine.
pub struct Engine<S> {
    config: EngineConfig,
    source: S,
    pipeline: Pipeline,
    shutdown: watch::Sender<bool>,
}

impl<S: FrameSource + 'static> Engine<S> {
    /// Create an engine over an already opened source.
    pub fn new(config: EngineConfig, source: S, pipeline: Pipeline) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            source,
            pipeline,
            shutdown,
        }
    }

    /// Handle that stops the engine when `true` is sent.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Run capture and orchestration until shutdown.
    pub async fn run(self) -> CaptureStats {
        let Engine {
            config,
            source,
            pipeline,
            shutdown,
        } = self;

        let buffer = Arc::new(RingBuffer::new(config.buffer_capacity()));
        let (publisher, latest) = latest_frame();

        let capture = CaptureLoop::new(
            source,
            publisher,
            Arc::clone(&buffer),
            config.source.fps,
            config.source_retry,
        );
        let capture_task = tokio::spawn(capture.run(shutdown.subscribe()));

        info!(
            camera_id = %config.camera_id,
            detectors = pipeline.pool.len(),
            buffer_frames = buffer.capacity(),
            "Engine started"
        );

        Orchestrator::new(&config, latest, buffer, pipeline)
            .run(shutdown.subscribe())
            .await;

        // The orchestrator only returns on shutdown; make sure capture follows.
        let _ = shutdown.send(true);
        match capture_task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Capture task failed: {}", e);
                CaptureStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shield_media::MediaResult;
    use shield_models::Frame;
    use std::time::Duration;

    struct CountingSource {
        next: u64,
    }

    #[async_trait]
    impl FrameSource for CountingSource {
        async fn open(&mut self) -> MediaResult<()> {
            Ok(())
        }

        async fn read_frame(&mut self) -> MediaResult<Frame> {
            self.next += 1;
            Ok(Frame::filled(self.next, 4, 4, [0, 0, 0]))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_engine_runs_until_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.source.fps = 100;
        config.recordings_dir = tmp.path().to_path_buf();
        config.detector.base_url = "http://127.0.0.1:9".to_string();
        config.detector_timeout = Duration::from_millis(50);
        config.telemetry.url = "ws://127.0.0.1:9/ws".to_string();
        config.telemetry.timeout = Duration::from_millis(50);

        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(pipeline.pool.len(), 3);

        let engine = Engine::new(config, CountingSource { next: 0 }, pipeline);
        let shutdown = engine.shutdown_handle();
        let handle = tokio::spawn(engine.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.send(true).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(stats.frames > 0);
    }

    #[tokio::test]
    async fn test_weapon_slot_follows_config() {
        let mut config = EngineConfig::default();
        config.weapon_detector_enabled = true;
        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(
            pipeline.pool.kinds(),
            vec![
                DetectorKind::Fight,
                DetectorKind::Fire,
                DetectorKind::Crowd,
                DetectorKind::Weapon
            ]
        );
    }
}
