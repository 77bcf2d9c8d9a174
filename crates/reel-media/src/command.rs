//! FFmpeg command builder and a generic tool runner.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Drop any video stream (cover art).
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set the output channel count.
    pub fn audio_channels(self, channels: u32) -> Self {
        self.output_arg("-ac").output_arg(channels.to_string())
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Captured output of a finished tool.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Whether either stream contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or_else(|| program.as_os_str())
        .to_string_lossy()
        .to_string()
}

/// Run `program` with `args`, killing it if it runs longer than `timeout`.
///
/// A non-zero exit status is a `ToolFailed` error carrying stderr.
pub async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> MediaResult<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    debug!(tool = %tool, ?args, "Running tool");

    let child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::ToolNotFound(tool.clone()),
            _ => MediaError::Io(e),
        })?;

    let started = Instant::now();

    // Dropping the wait future drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(tool = %tool, "Tool timed out after {} seconds, killing process", timeout.as_secs());
            metrics::counter!("reel_tool_timeouts_total", "tool" => tool.clone()).increment(1);
            return Err(MediaError::Timeout {
                tool,
                secs: timeout.as_secs(),
            });
        }
    };

    metrics::histogram!("reel_tool_duration_seconds", "tool" => tool.clone())
        .record(started.elapsed().as_secs_f64());

    let result = ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if output.status.success() {
        Ok(result)
    } else {
        Err(MediaError::tool_failed(
            tool,
            "exited with non-zero status",
            Some(result.stderr),
            output.status.code(),
        ))
    }
}

/// Resolve a tool by name or path.
pub fn check_tool(program: &Path) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::ToolNotFound(tool_name(program)))
}
