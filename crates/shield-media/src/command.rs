//! FFmpeg command builder and process spawning.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Pipe endpoint names understood by ffmpeg.
pub const PIPE_STDIN: &str = "pipe:0";
pub const PIPE_STDOUT: &str = "pipe:1";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input (file, device, URL or pipe)
    input: String,
    /// Output (file or pipe)
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Create a command writing to a file path.
    pub fn to_file(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self::new(input, output.as_ref().to_string_lossy().to_string())
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Force the input demuxer (e.g. `v4l2`, `dshow`, `avfoundation`).
    pub fn input_format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Requested capture rate for device inputs.
    pub fn input_frame_rate(self, fps: u32) -> Self {
        self.input_arg("-framerate").input_arg(fps.to_string())
    }

    /// Describe a raw RGB24 input stream.
    pub fn raw_rgb_input(self, width: u32, height: u32, fps: u32) -> Self {
        self.input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            fps.to_string(),
        ])
    }

    /// Emit raw RGB24 frames scaled to a fixed size.
    pub fn raw_rgb_output(self, width: u32, height: u32) -> Self {
        self.output_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
        ])
    }

    /// Set output frame rate.
    pub fn output_frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Move the MP4 index to the front so partial uploads stay playable.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());
        // a piped input is read from stdin
        if self.input != PIPE_STDIN {
            args.push("-nostdin".to_string());
        }

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.clone());

        args.push(self.output.clone());

        args
    }

    /// Spawn ffmpeg with the given stdio wiring.
    ///
    /// The child is killed when its handle is dropped.
    pub fn spawn(&self, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> MediaResult<Child> {
        let ffmpeg = check_ffmpeg()?;
        let args = self.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let child = Command::new(ffmpeg)
            .args(&args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()?;

        Ok(child)
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("/dev/video0", PIPE_STDOUT)
            .input_format("v4l2")
            .input_frame_rate(15)
            .raw_rgb_output(640, 480);

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert_eq!(args.last().map(String::as_str), Some(PIPE_STDOUT));

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let format_pos = args.iter().position(|a| a == "v4l2").unwrap();
        let size_pos = args.iter().position(|a| a == "640x480").unwrap();
        assert!(format_pos < input_pos);
        assert!(size_pos > input_pos);
        assert!(args.contains(&"rgb24".to_string()));
    }

    #[test]
    fn test_raw_input_precedes_input_flag() {
        let cmd = FfmpegCommand::to_file(PIPE_STDIN, "/tmp/out.mp4")
            .raw_rgb_input(320, 240, 15)
            .video_codec("libx264")
            .crf(23);

        let args = cmd.build_args();
        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let rawvideo_pos = args.iter().position(|a| a == "rawvideo").unwrap();
        let codec_pos = args.iter().position(|a| a == "libx264").unwrap();
        assert!(rawvideo_pos < input_pos);
        assert!(codec_pos > input_pos);
        assert_eq!(args[input_pos + 1], PIPE_STDIN);
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
        assert!(!args.contains(&"-nostdin".to_string()));
    }
}
