//! The tool seam used by the processing pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use reel_models::Waveform;

use crate::command::check_tool;
use crate::error::MediaResult;
use crate::probe::{probe_audio, AudioInfo};
use crate::transcode::transcode_to_mp3;
use crate::waveform::WaveformRenderer;

/// Tool locations and time limits.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub audiowaveform_bin: PathBuf,
    /// Limit for transcoding and waveform rendering
    pub tool_timeout: Duration,
    /// Limit for probing
    pub probe_timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            audiowaveform_bin: PathBuf::from("/usr/local/bin/audiowaveform"),
            tool_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(60),
        }
    }
}

impl ToolConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: std::env::var("FFPROBE_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_bin),
            audiowaveform_bin: std::env::var("AUDIOWAVEFORM_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.audiowaveform_bin),
            tool_timeout: Duration::from_secs(
                std::env::var("TOOL_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            probe_timeout: Duration::from_secs(
                std::env::var("PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }

    /// Longest a single track can spend in the tools: one probe, one
    /// transcode and two audiowaveform renders.
    pub fn max_job_duration(&self) -> Duration {
        self.probe_timeout + self.tool_timeout * 3
    }
}

/// Audio operations the pipeline needs.
#[async_trait]
pub trait AudioTools: Send + Sync {
    /// Read duration, sample rate, channels and bitrate.
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo>;

    /// Re-encode `input` to the MP3 delivery format at `output`.
    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Write the JSON envelope and PNG preview, returning the parsed envelope.
    async fn render_waveform(
        &self,
        input: &Path,
        json_out: &Path,
        png_out: &Path,
    ) -> MediaResult<Waveform>;
}

/// [`AudioTools`] backed by the ffprobe, ffmpeg and audiowaveform binaries.
#[derive(Debug, Clone)]
pub struct CliAudioTools {
    config: ToolConfig,
    renderer: WaveformRenderer,
}

impl CliAudioTools {
    pub fn new(config: ToolConfig) -> Self {
        let renderer = WaveformRenderer::new(config.audiowaveform_bin.clone(), config.tool_timeout);
        Self { config, renderer }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Resolve every binary, in the order ffmpeg, ffprobe, audiowaveform.
    pub fn check_available(&self) -> Vec<(&'static str, MediaResult<PathBuf>)> {
        vec![
            ("ffmpeg", check_tool(&self.config.ffmpeg_bin)),
            ("ffprobe", check_tool(&self.config.ffprobe_bin)),
            ("audiowaveform", check_tool(&self.config.audiowaveform_bin)),
        ]
    }
}

#[async_trait]
impl AudioTools for CliAudioTools {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo> {
        probe_audio(&self.config.ffprobe_bin, path, self.config.probe_timeout).await
    }

    async fn transcode(&self, input: &Path, output: &Path) -> MediaResult<()> {
        transcode_to_mp3(&self.config.ffmpeg_bin, input, output, self.config.tool_timeout).await
    }

    async fn render_waveform(
        &self,
        input: &Path,
        json_out: &Path,
        png_out: &Path,
    ) -> MediaResult<Waveform> {
        self.renderer.render(input, json_out, png_out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    #[test]
    fn test_default_limits() {
        let config = ToolConfig::default();
        assert_eq!(config.tool_timeout, Duration::from_secs(600));
        assert_eq!(config.probe_timeout, Duration::from_secs(60));
        assert_eq!(config.max_job_duration(), Duration::from_secs(1860));
    }

    #[test]
    fn test_check_reports_missing_binaries() {
        let tools = CliAudioTools::new(ToolConfig {
            audiowaveform_bin: PathBuf::from("/nonexistent/audiowaveform"),
            ..ToolConfig::default()
        });

        let checks = tools.check_available();
        let names: Vec<_> = checks.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe", "audiowaveform"]);
        assert!(matches!(checks[2].1, Err(MediaError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let tools = CliAudioTools::new(ToolConfig::default());
        let err = tools.probe(Path::new("/nonexistent/a.flac")).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
