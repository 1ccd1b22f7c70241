//! Bounded history of recent frames.

use std::collections::VecDeque;
use std::sync::Mutex;

use shield_models::Frame;

/// Fixed-capacity FIFO of frames in capture order.
///
/// Shared between the capture loop (writer) and the orchestrator (reader);
/// every access goes through one lock, and [`RingBuffer::snapshot`] copies the
/// contents out while holding it.
#[derive(Debug)]
pub struct RingBuffer {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Buffer sized for `fps * seconds` frames.
    pub fn for_window(fps: u32, seconds: u32) -> Self {
        Self::new(fps as usize * seconds as usize)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a frame, evicting the oldest when full.
    pub fn push(&self, frame: Frame) {
        let mut frames = self.lock();
        if frames.len() == self.capacity {
            frames.pop_front();
        }
        frames.push_back(frame);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Frame>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
