//! Waveform rendering with audiowaveform.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use reel_models::Waveform;

use crate::command::{run_tool, ToolOutput};
use crate::error::{MediaError, MediaResult};

/// Printed by audiowaveform when it cannot handle the input.
pub const WAVEFORM_UNAVAILABLE_MARKER: &str = "Can't generate";

/// Arguments for the numeric JSON envelope.
pub fn json_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "--pixels-per-second".to_string(),
        "10".to_string(),
        "-b".to_string(),
        "8".to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Arguments for the 384x64 PNG preview.
pub fn png_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "--width".to_string(),
        "384".to_string(),
        "--height".to_string(),
        "64".to_string(),
        "--no-axis-labels".to_string(),
        "-o".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Treat a marker in the tool output as a failure even on a zero exit status.
fn check_marker(stage: &str, output: &ToolOutput) -> MediaResult<()> {
    if output.contains(WAVEFORM_UNAVAILABLE_MARKER) {
        let detail = if output.stdout.trim().is_empty() {
            output.stderr.trim()
        } else {
            output.stdout.trim()
        };
        return Err(MediaError::WaveformUnavailable(format!("{}: {}", stage, detail)));
    }
    Ok(())
}

/// Runs audiowaveform to produce the JSON envelope and the PNG preview.
#[derive(Debug, Clone)]
pub struct WaveformRenderer {
    bin: PathBuf,
    timeout: Duration,
}

impl WaveformRenderer {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    /// Render both outputs and return the parsed envelope.
    pub async fn render(&self, input: &Path, json_out: &Path, png_out: &Path) -> MediaResult<Waveform> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let output = run_tool(&self.bin, json_args(input, json_out), self.timeout).await?;
        check_marker("JSON", &output)?;

        let raw = tokio::fs::read_to_string(json_out).await?;
        let waveform = Waveform::from_json(&raw).map_err(|e| {
            warn!(path = %json_out.display(), "Unparsable waveform envelope: {}", e);
            MediaError::JsonParse(e)
        })?;

        let output = run_tool(&self.bin, png_args(input, png_out), self.timeout).await?;
        check_marker("PNG", &output)?;

        debug!(input = %input.display(), points = waveform.data.len(), "Rendered waveform");
        Ok(waveform)
    }
}
