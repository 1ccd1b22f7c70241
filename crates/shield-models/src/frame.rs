//! Captured video frames.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Bytes per pixel of the packed RGB24 layout used by every frame.
pub const BYTES_PER_PIXEL: usize = 3;

/// Errors raised when building a frame from raw pixels.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame dimensions must be non-zero (got {width}x{height})")]
    ZeroSized { width: u32, height: u32 },

    #[error("Invalid frame buffer for {width}x{height}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A single captured frame, packed RGB24 in row-major order.
///
/// Pixel data sits behind an `Arc<[u8]>` and is never mutated after capture.
/// The latest-frame mailbox, the ring buffer and detector workers each hold
/// their own handle, none of which borrows from the capture device.
#[derive(Debug, Clone)]
pub struct Frame {
    seq: u64,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
    data: Arc<[u8]>,
}

impl Frame {
    /// Create a frame from raw RGB24 pixels.
    pub fn new(
        seq: u64,
        width: u32,
        height: u32,
        captured_at: DateTime<Utc>,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroSized { width, height });
        }

        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            seq,
            width,
            height,
            captured_at,
            data: data.into(),
        })
    }

    /// Create a frame filled with a single colour, captured now.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn filled(seq: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        assert!(width > 0 && height > 0, "frame dimensions must be non-zero");
        let data: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();

        Self {
            seq,
            width,
            height,
            captured_at: Utc::now(),
            data: data.into(),
        }
    }

    /// Number of bytes a `width` x `height` RGB24 frame occupies.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Capture sequence number, strictly increasing per source.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Raw RGB24 pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether two frames share width and height.
    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Derive a frame with the same identity and geometry but new pixels.
    ///
    /// Used for annotated copies; the original frame is left untouched.
    pub fn with_data(&self, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(self.seq, self.width, self.height, self.captured_at, data)
    }
}
