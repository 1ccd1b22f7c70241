//! Clip encoding.
//!
//! Frames are streamed as raw RGB24 into an ffmpeg child that writes a single
//! H.264 MP4 at the source frame rate.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tracing::{debug, info, warn};

use shield_models::Frame;

use crate::command::{FfmpegCommand, PIPE_STDIN};
use crate::error::{MediaError, MediaResult};

/// Encoder settings for event clips.
#[derive(Debug, Clone)]
pub struct ClipEncoder {
    fps: u32,
    codec: String,
    preset: String,
    crf: u8,
    timeout: Duration,
}

impl ClipEncoder {
    /// Create an encoder writing at `fps`.
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the maximum time a single encode may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set CRF (quality).
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// The ffmpeg invocation for a clip of the given geometry.
    pub fn command(&self, width: u32, height: u32, output: &Path) -> FfmpegCommand {
        FfmpegCommand::to_file(PIPE_STDIN, output)
            .raw_rgb_input(width, height, self.fps)
            .video_codec(&self.codec)
            .preset(&self.preset)
            .crf(self.crf)
            .pixel_format("yuv420p")
            .faststart()
    }

    /// Encode `frames` in order into `output`.
    ///
    /// The geometry of the last frame wins; frames of a different size (a
    /// camera renegotiation mid-buffer) are skipped. Returns the number of
    /// frames written.
    pub async fn encode(&self, frames: &[Frame], output: &Path) -> MediaResult<usize> {
        let last = frames
            .last()
            .ok_or_else(|| MediaError::encode("no frames to encode"))?;
        let (width, height) = (last.width(), last.height());

        let child = self
            .command(width, height, output)
            .spawn(Stdio::piped(), Stdio::null(), Stdio::piped())
            .map_err(|e| MediaError::encode(format!("cannot start encoder: {}", e)))?;

        let frames_out = frames.iter().filter(|f| f.same_geometry(last));
        let (result, written, write_error) =
            tokio::time::timeout(self.timeout, feed_and_wait(child, frames_out))
                .await
                .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        let skipped = frames.len() - written;
        if skipped > 0 && write_error.is_none() {
            warn!("Skipped {} frames with mismatched geometry", skipped);
        }

        if !result.status.success() {
            return Err(MediaError::encode_with_stderr(
                format!(
                    "ffmpeg exited with {} writing {}",
                    result
                        .status
                        .code()
                        .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    output.display()
                ),
                String::from_utf8_lossy(&result.stderr),
            ));
        }

        if let Some(e) = write_error {
            return Err(MediaError::encode(format!("encoder pipe closed: {}", e)));
        }

        info!(
            "Encoded {} frames ({}x{} @ {} fps) to {}",
            written,
            width,
            height,
            self.fps,
            output.display()
        );
        Ok(written)
    }
}

/// Stream frames into the encoder, close its stdin and wait for it to exit.
///
/// Dropping this future kills the child.
async fn feed_and_wait<'a>(
    mut child: Child,
    frames: impl Iterator<Item = &'a Frame>,
) -> MediaResult<(Output, usize, Option<std::io::Error>)> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| MediaError::encode("encoder stdin not captured"))?;

    let mut written = 0usize;
    let mut write_error = None;
    for frame in frames {
        if let Err(e) = stdin.write_all(frame.data()).await {
            // ffmpeg usually exits early when it cannot open the output;
            // its stderr says why
            write_error = Some(e);
            break;
        }
        written += 1;
    }
    if let Err(e) = stdin.shutdown().await {
        debug!("Encoder stdin shutdown: {}", e);
    }
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| MediaError::encode(format!("encoder wait failed: {}", e)))?;
    Ok((output, written, write_error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_encode_without_frames_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClipEncoder::new(15)
            .encode(&[], &dir.path().join("empty.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Encode { .. }));
    }

    #[test]
    fn test_encoder_command() {
        let encoder = ClipEncoder::new(15).with_crf(20);
        let args = encoder
            .command(640, 480, Path::new("/rec/Fire_1.mp4"))
            .build_args();

        assert!(args.contains(&"640x480".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"20".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/rec/Fire_1.mp4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wedged_encoder_times_out_while_writing() {
        if crate::command::check_ffmpeg().is_err() {
            return;
        }
        // Opening a FIFO with no reader blocks ffmpeg before it drains stdin.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Fire_wedged.mp4");
        let made = std::process::Command::new("mkfifo")
            .arg(&output)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !made {
            return;
        }

        let frames: Vec<Frame> = (0..20)
            .map(|seq| Frame::filled(seq, 640, 480, [200, 40, 40]))
            .collect();
        let encoder = ClipEncoder::new(15).with_timeout(Duration::from_millis(500));

        let err = tokio::time::timeout(Duration::from_secs(10), encoder.encode(&frames, &output))
            .await
            .expect("encode must honour its own timeout")
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(_)), "{}", err);
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        assert_eq!(ClipEncoder::new(0).fps(), 1);
    }
}
