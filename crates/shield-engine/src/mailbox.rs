//! Single-slot latest-frame mailbox.
//!
//! The capture loop overwrites the slot on every frame; the orchestrator
//! reads whatever is newest. Nothing is ever queued.

use tokio::sync::watch;

use shield_models::Frame;

/// Writer half, owned by the capture loop.
#[derive(Debug)]
pub struct FramePublisher {
    tx: watch::Sender<Option<Frame>>,
}

/// Reader half, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct LatestFrame {
    rx: watch::Receiver<Option<Frame>>,
}

/// Create an empty mailbox.
pub fn latest_frame() -> (FramePublisher, LatestFrame) {
    let (tx, rx) = watch::channel(None);
    (FramePublisher { tx }, LatestFrame { rx })
}

impl FramePublisher {
    /// Replace the slot contents.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(frame));
    }
}

impl LatestFrame {
    /// The newest frame, only if its sequence number is after `last_seq`.
    pub fn newer_than(&self, last_seq: Option<u64>) -> Option<Frame> {
        let slot = self.rx.borrow();
        match (slot.as_ref(), last_seq) {
            (Some(frame), Some(seen)) if frame.seq() <= seen => None,
            (Some(frame), _) => Some(frame.clone()),
            (None, _) => None,
        }
    }
}
