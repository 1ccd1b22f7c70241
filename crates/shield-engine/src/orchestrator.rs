//! The main loop.
//!
//! One tick: take the newest frame, run every detector on it, classify,
//! send metadata, maybe record and upload a clip, then send the JPEG frame.
//! Failures inside a tick degrade that tick only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{debug, info, Instrument};

use shield_detect::{DetectionThresholds, DetectorPool};
use shield_media::encode_jpeg;
use shield_models::{Event, Frame, TelemetryMessage};
use shield_storage::Uploader;
use shield_telemetry::TelemetrySink;

use crate::config::EngineConfig;
use crate::cooldown::{CooldownGate, GateState};
use crate::logging::CameraLogger;
use crate::mailbox::LatestFrame;
use crate::metrics::names;
use crate::policy::classify;
use crate::recorder::ClipRecorder;
use crate::ring_buffer::RingBuffer;

/// Collaborators the orchestrator drives.
pub struct Pipeline {
    pub pool: DetectorPool,
    pub recorder: Arc<dyn ClipRecorder>,
    pub uploader: Uploader,
    pub telemetry: Box<dyn TelemetrySink>,
}

/// What happened to the clip side of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipDecision {
    /// No event this tick.
    NoEvent,
    /// Clip recorded and handed to the uploader.
    Recorded(PathBuf),
    /// Event observed during cooldown.
    Suppressed,
    /// Recording failed; the tick carried on without a clip.
    Failed,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No frame newer than the last processed one.
    Idle,
    Processed {
        seq: u64,
        event: Option<Event>,
        clip: ClipDecision,
    },
}

pub struct Orchestrator {
    frames: LatestFrame,
    buffer: Arc<RingBuffer>,
    pipeline: Pipeline,
    thresholds: DetectionThresholds,
    stampede_threshold: usize,
    gate: CooldownGate,
    jpeg_quality: u8,
    tick_interval: Duration,
    idle_interval: Duration,
    last_seq: Option<u64>,
    logger: CameraLogger,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        frames: LatestFrame,
        buffer: Arc<RingBuffer>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            frames,
            buffer,
            pipeline,
            thresholds: config.thresholds,
            stampede_threshold: config.stampede_threshold,
            gate: CooldownGate::new(config.event_cooldown),
            jpeg_quality: config.telemetry_jpeg_quality,
            tick_interval: config.tick_interval,
            idle_interval: config.idle_interval,
            last_seq: None,
            logger: CameraLogger::new(config.camera_id.clone()),
        }
    }

    pub fn gate_state(&self, now: Instant) -> GateState {
        self.gate.state(now)
    }

    /// Run one tick at the current time.
    pub async fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now()).await
    }

    /// Run one tick, using `now` for cooldown decisions.
    pub async fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let Some(frame) = self.frames.newer_than(self.last_seq) else {
            return TickOutcome::Idle;
        };
        let started = Instant::now();
        self.last_seq = Some(frame.seq());

        let result = self.pipeline.pool.detect_all(&frame, &self.thresholds).await;
        let event = classify(&result, self.stampede_threshold);

        let message = TelemetryMessage::detections(&result, event.as_ref());
        if let Err(e) = self.pipeline.telemetry.send_metadata(&message).await {
            debug!(frame = frame.seq(), error = %e, "Telemetry metadata not delivered");
        }

        let clip = match &event {
            Some(event) => self.handle_event(event, now).await,
            None => ClipDecision::NoEvent,
        };

        self.send_frame(&frame).await;

        counter!(names::TICKS_TOTAL).increment(1);
        histogram!(names::TICK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        TickOutcome::Processed {
            seq: frame.seq(),
            event,
            clip,
        }
    }

    async fn handle_event(&mut self, event: &Event, now: Instant) -> ClipDecision {
        counter!(names::EVENTS_TOTAL, "event_type" => event.event_type.as_str()).increment(1);

        if !self.gate.try_trigger(now) {
            counter!(names::EVENTS_SUPPRESSED_TOTAL, "event_type" => event.event_type.as_str())
                .increment(1);
            self.logger.log_suppressed(event.event_type);
            return ClipDecision::Suppressed;
        }

        self.logger.log_triggered(event);
        let snapshot = self.buffer.snapshot();

        match self.pipeline.recorder.record(snapshot, event).await {
            Ok(artifact) => {
                let path = artifact.path().to_path_buf();
                self.pipeline.uploader.submit(artifact);
                ClipDecision::Recorded(path)
            }
            Err(e) => {
                counter!(names::CLIPS_FAILED_TOTAL, "event_type" => event.event_type.as_str())
                    .increment(1);
                self.logger.log_clip_failed(event.event_type, &e);
                ClipDecision::Failed
            }
        }
    }

    async fn send_frame(&mut self, frame: &Frame) {
        if !self.pipeline.telemetry.is_connected() {
            return;
        }
        let jpeg = match encode_jpeg(frame, self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                debug!(frame = frame.seq(), error = %e, "Cannot encode telemetry frame");
                return;
            }
        };
        if let Err(e) = self.pipeline.telemetry.send_frame(jpeg).await {
            debug!(frame = frame.seq(), error = %e, "Telemetry frame not delivered");
        }
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Stops at the end of the current tick; uploads still in flight are not
    /// awaited.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let span = self.logger.create_span();
        async move {
            info!("Orchestrator started");
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let pause = match self.tick().await {
                    TickOutcome::Idle => self.idle_interval,
                    TickOutcome::Processed { .. } => self.tick_interval,
                };

                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(pause) => {}
                }
            }
            info!("Orchestrator stopped");
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineResult, EngineError};
    use crate::mailbox::latest_frame;
    use async_trait::async_trait;
    use shield_detect::detector_fn;
    use shield_media::MediaError;
    use shield_models::{
        ClipArtifact, ClipMetadata, Detection, DetectorKind, EventType, GeoLocation,
    };
    use shield_storage::{ClipTransport, StorageResult};
    use shield_telemetry::{TelemetryError, TelemetryResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingRecorder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ClipRecorder for CountingRecorder {
        async fn record(&self, frames: Vec<Frame>, event: &Event) -> EngineResult<ClipArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::from(MediaError::encode("cannot open output")));
            }
            let metadata = ClipMetadata::new(event.event_type, "cam1", GeoLocation::default(), chrono::Utc::now());
            assert!(!frames.is_empty());
            Ok(ClipArtifact::new(format!("/rec/{}", metadata.file_name()), metadata))
        }
    }

    struct NullTransport;

    #[async_trait]
    impl ClipTransport for NullTransport {
        async fn deliver(&self, _artifact: &ClipArtifact) -> StorageResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    struct LogSink {
        log: Log,
        connected: bool,
    }

    #[async_trait]
    impl TelemetrySink for LogSink {
        async fn send_metadata(&mut self, message: &TelemetryMessage) -> TelemetryResult<()> {
            if !self.connected {
                return Err(TelemetryError::Closed);
            }
            let event = message.event_type().map_or("null".to_string(), |e| e.to_string());
            self.log.0.lock().unwrap().push(format!("meta:{}", event));
            Ok(())
        }

        async fn send_frame(&mut self, _jpeg: Vec<u8>) -> TelemetryResult<()> {
            self.log.0.lock().unwrap().push("frame".to_string());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn fire_on_even() -> DetectorPool {
        DetectorPool::new(Duration::from_secs(1)).with_detector(
            DetectorKind::Fire,
            detector_fn(|frame, _| {
                Ok(if frame.seq() % 2 == 0 {
                    vec![Detection::new([0.0, 0.0, 2.0, 2.0], 0.5, 0, "fire")]
                } else {
                    Vec::new()
                })
            }),
        )
    }

    fn orchestrator(
        recorder: Arc<CountingRecorder>,
        connected: bool,
    ) -> (Orchestrator, crate::mailbox::FramePublisher, Arc<RingBuffer>, Log) {
        let (publisher, latest) = latest_frame();
        let buffer = Arc::new(RingBuffer::new(10));
        let log = Log::default();
        let pipeline = Pipeline {
            pool: fire_on_even(),
            recorder,
            uploader: Uploader::new(Arc::new(NullTransport)),
            telemetry: Box::new(LogSink {
                log: log.clone(),
                connected,
            }),
        };
        let orchestrator = Orchestrator::new(&EngineConfig::default(), latest, Arc::clone(&buffer), pipeline);
        (orchestrator, publisher, buffer, log)
    }

    fn push(publisher: &crate::mailbox::FramePublisher, buffer: &RingBuffer, seq: u64) {
        let frame = Frame::filled(seq, 8, 8, [10, 10, 10]);
        buffer.push(frame.clone());
        publisher.publish(frame);
    }

    #[tokio::test]
    async fn test_idle_without_new_frame() {
        let recorder = Arc::new(CountingRecorder::default());
        let (mut orch, publisher, buffer, log) = orchestrator(recorder, true);

        assert_eq!(orch.tick().await, TickOutcome::Idle);

        push(&publisher, &buffer, 1);
        assert!(matches!(orch.tick().await, TickOutcome::Processed { seq: 1, event: None, .. }));
        assert_eq!(orch.tick().await, TickOutcome::Idle);
        assert_eq!(*log.0.lock().unwrap(), vec!["meta:null", "frame"]);
    }

    #[tokio::test]
    async fn test_failed_recording_keeps_running() {
        let recorder = Arc::new(CountingRecorder {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let (mut orch, publisher, buffer, log) = orchestrator(Arc::clone(&recorder), true);
        let t0 = Instant::now();

        push(&publisher, &buffer, 2);
        let outcome = orch.tick_at(t0).await;
        assert!(matches!(outcome, TickOutcome::Processed { clip: ClipDecision::Failed, .. }));
        assert_eq!(orch.gate_state(t0), GateState::InCooldown);

        push(&publisher, &buffer, 3);
        assert!(matches!(
            orch.tick_at(t0 + Duration::from_secs(1)).await,
            TickOutcome::Processed { seq: 3, event: None, .. }
        ));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.0.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_disconnected_telemetry_does_not_block_clips() {
        let recorder = Arc::new(CountingRecorder::default());
        let (mut orch, publisher, buffer, log) = orchestrator(Arc::clone(&recorder), false);

        push(&publisher, &buffer, 4);
        let outcome = orch.tick_at(Instant::now()).await;

        match outcome {
            TickOutcome::Processed { event: Some(event), clip: ClipDecision::Recorded(path), .. } => {
                assert_eq!(event.event_type, EventType::Fire);
                assert!(path.to_string_lossy().contains("Fire_"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(log.0.lock().unwrap().is_empty());
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let recorder = Arc::new(CountingRecorder::default());
        let (orch, publisher, buffer, _log) = orchestrator(recorder, true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        push(&publisher, &buffer, 1);
        let handle = tokio::spawn(orch.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
