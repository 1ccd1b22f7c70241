//! Frame sources.
//!
//! A [`FrameSource`] produces frames on its own cadence. The capture loop in
//! the engine owns the source; nothing else reads from it directly.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info, warn};

use shield_models::Frame;

use crate::command::{check_ffmpeg, FfmpegCommand, PIPE_STDOUT};
use crate::error::{MediaError, MediaResult};

/// Camera or video input.
#[async_trait]
pub trait FrameSource: Send {
    /// Open the input.
    ///
    /// Fails with [`MediaError::SourceUnavailable`] if no device responds.
    async fn open(&mut self) -> MediaResult<()>;

    /// Read the next frame.
    ///
    /// Errors are per-read: the caller backs off and calls again.
    async fn read_frame(&mut self) -> MediaResult<Frame>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Configuration for an ffmpeg-backed source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Device path or stream URL (e.g. `/dev/video0`, `rtsp://...`)
    pub input: String,
    /// Input demuxer; `None` lets ffmpeg probe
    pub input_format: Option<String>,
    /// Output frame width
    pub width: u32,
    /// Output frame height
    pub height: u32,
    /// Target capture rate
    pub fps: u32,
    /// How long `open` waits for the first frame
    pub open_timeout: Duration,
    /// How long a read waits before the input counts as stalled
    pub read_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input: "/dev/video0".to_string(),
            input_format: Some("v4l2".to_string()),
            width: 640,
            height: 480,
            fps: 15,
            open_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Frame source that decodes any ffmpeg input to raw RGB24 frames.
///
/// A failed read tears the ffmpeg child down; the next read respawns it.
pub struct FfmpegSource {
    config: SourceConfig,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    pending: Option<Frame>,
    next_seq: u64,
}

impl FfmpegSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            child: None,
            stdout: None,
            pending: None,
            next_seq: 0,
        }
    }

    /// The ffmpeg invocation used for capture.
    pub fn command(&self) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.config.input, PIPE_STDOUT);
        if let Some(format) = &self.config.input_format {
            cmd = cmd
                .input_format(format)
                .input_frame_rate(self.config.fps);
        }
        cmd.raw_rgb_output(self.config.width, self.config.height)
            .output_frame_rate(self.config.fps)
    }

    fn spawn(&mut self) -> MediaResult<()> {
        let mut child = self
            .command()
            .spawn(Stdio::null(), Stdio::piped(), Stdio::null())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::source_read("ffmpeg stdout not captured"))?;

        debug!("Spawned capture process for {}", self.config.input);
        self.child = Some(child);
        self.stdout = Some(stdout);
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Capture process already gone: {}", e);
            }
        }
        self.stdout = None;
    }

    /// Read one frame, failing if the process stays silent for `limit`.
    async fn read_raw(&mut self, limit: Duration) -> MediaResult<Frame> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| MediaError::source_read("capture process not running"))?;

        let mut buf = vec![0u8; Frame::byte_len(self.config.width, self.config.height)];
        match tokio::time::timeout(limit, stdout.read_exact(&mut buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(MediaError::source_read(format!("capture stream ended: {}", e)))
            }
            Err(_) => {
                return Err(MediaError::source_read(format!(
                    "capture stream stalled for {:?}",
                    limit
                )))
            }
        }

        let frame = Frame::new(
            self.next_seq,
            self.config.width,
            self.config.height,
            Utc::now(),
            buf,
        )?;
        self.next_seq += 1;
        Ok(frame)
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn open(&mut self) -> MediaResult<()> {
        check_ffmpeg().map_err(|e| MediaError::source_unavailable(e.to_string()))?;

        self.spawn()
            .map_err(|e| MediaError::source_unavailable(e.to_string()))?;

        match self.read_raw(self.config.open_timeout).await {
            Ok(frame) => {
                info!(
                    "Opened {} ({}x{} @ {} fps)",
                    self.config.input, self.config.width, self.config.height, self.config.fps
                );
                self.pending = Some(frame);
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(MediaError::source_unavailable(format!(
                    "{} produced no frames: {}",
                    self.config.input, e
                )))
            }
        }
    }

    async fn read_frame(&mut self) -> MediaResult<Frame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }

        if self.stdout.is_none() {
            warn!("Restarting capture process for {}", self.config.input);
            self.spawn()?;
        }

        match self.read_raw(self.config.read_timeout).await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        match &self.config.input_format {
            Some(format) => format!("{} ({})", self.config.input, format),
            None => self.config.input.clone(),
        }
    }
}
