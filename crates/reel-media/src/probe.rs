//! FFprobe audio information.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use crate::command::run_tool;
use crate::error::{MediaError, MediaResult};

/// Technical attributes of an audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u32,
    /// Average bitrate in kbit/s
    pub bitrate: u32,
    /// Codec name
    pub codec: Option<String>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Probe an audio file.
pub async fn probe_audio(
    ffprobe: &Path,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<AudioInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args = [
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ];
    let output = run_tool(
        ffprobe,
        args.iter()
            .map(OsStr::new)
            .chain(std::iter::once(path.as_os_str())),
        timeout,
    )
    .await?;

    parse_probe_output(output.stdout.as_bytes())
}

/// Extract [`AudioInfo`] from ffprobe's JSON output.
pub fn parse_probe_output(raw: &[u8]) -> MediaResult<AudioInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| MediaError::invalid_audio("No audio stream found"))?;

    let format = probe.format.as_ref();

    let duration = format
        .and_then(|f| f.duration.as_deref())
        .or(stream.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // bits/s, format-level average first
    let bitrate = format
        .and_then(|f| f.bit_rate.as_deref())
        .or(stream.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .map(|bps| (bps / 1000) as u32)
        .unwrap_or(0);

    Ok(AudioInfo {
        duration,
        sample_rate: stream
            .sample_rate
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(0),
        channels: stream.channels.unwrap_or(0),
        bitrate,
        codec: stream.codec_name.clone(),
    })
}
