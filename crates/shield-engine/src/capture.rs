//! Capture loop.
//!
//! Runs on its own task at the source frame rate, independent of how fast the
//! orchestrator consumes. Every frame goes to the latest-frame mailbox and the
//! ring buffer, in capture order.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use shield_media::FrameSource;

use crate::mailbox::FramePublisher;
use crate::metrics::names;
use crate::ring_buffer::RingBuffer;

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub read_errors: u64,
}

/// Producer side of the pipeline.
pub struct CaptureLoop<S> {
    source: S,
    publisher: FramePublisher,
    buffer: Arc<RingBuffer>,
    frame_interval: Duration,
    retry: Duration,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        publisher: FramePublisher,
        buffer: Arc<RingBuffer>,
        fps: u32,
        retry: Duration,
    ) -> Self {
        Self {
            source,
            publisher,
            buffer,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            retry,
        }
    }

    /// Capture until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Read failures are retried after the configured backoff; they never end
    /// the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CaptureStats {
        let mut stats = CaptureStats::default();
        let mut pace = tokio::time::interval(self.frame_interval);
        pace.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Capturing from {} every {:?}", self.source.describe(), self.frame_interval);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let read = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                read = async {
                    pace.tick().await;
                    self.source.read_frame().await
                } => read,
            };

            match read {
                Ok(frame) => {
                    stats.frames += 1;
                    counter!(names::FRAMES_CAPTURED_TOTAL).increment(1);
                    self.buffer.push(frame.clone());
                    self.publisher.publish(frame);
                    gauge!(names::RING_BUFFER_FRAMES).set(self.buffer.len() as f64);
                }
                Err(e) => {
                    stats.read_errors += 1;
                    counter!(names::SOURCE_READ_ERRORS_TOTAL).increment(1);
                    warn!(
                        error = %e,
                        "Frame read from {} failed, retrying in {:?}",
                        self.source.describe(),
                        self.retry
                    );
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(self.retry) => {}
                    }
                }
            }
        }

        debug!(frames = stats.frames, read_errors = stats.read_errors, "Capture loop stopped");
        stats
    }
}
