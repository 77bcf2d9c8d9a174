//! Derived technical metadata and waveform artifact for a track.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::ProcessingState;
use crate::track::TrackId;

/// Codec family and human readable label for a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLabel {
    pub family: &'static str,
    pub label: &'static str,
}

/// Map a detected MIME type to its codec label. Unknown types have none.
pub fn codec_for_mime(mimetype: &str) -> Option<CodecLabel> {
    let (family, label) = match mimetype {
        "audio/mpeg" => ("MP3", "Mpeg 3"),
        "audio/x-wav" | "audio/wav" => ("WAV", "WAV"),
        "audio/ogg" => ("OGG", "Ogg Vorbis"),
        "audio/x-flac" | "audio/flac" => ("FLAC", "FLAC"),
        _ => return None,
    };
    Some(CodecLabel { family, label })
}

/// Numeric envelope produced by the waveform renderer (JSON output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    #[serde(default)]
    pub version: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
    pub sample_rate: u32,
    pub samples_per_pixel: u32,
    pub bits: u32,
    pub length: u64,
    pub data: Vec<i64>,
}

fn default_channels() -> u32 {
    1
}

impl Waveform {
    /// Parse the renderer's JSON output.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Technical attributes extracted by the metadata stage, plus the waveform.
///
/// Exclusively owned by its parent track once linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: i64,
    pub track_id: TrackId,
    pub hash: String,

    /// Seconds
    pub duration: f64,
    /// Sample rate in Hz
    pub rate: u32,
    pub channels: u32,
    /// Average bitrate in kbit/s
    pub bitrate: u32,
    /// Codec name reported by the probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// MP3, OGG, FLAC, WAV or blank
    #[serde(rename = "type")]
    pub codec_family: String,
    /// Mpeg 3, Ogg Vorbis, ...
    #[serde(rename = "type_human")]
    pub codec_label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Waveform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waveform_err: Option<String>,

    pub processed_basic: ProcessingState,
    pub processed_waveform: ProcessingState,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub processing_start: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub processing_stop: Option<DateTime<Utc>>,
}

impl TrackInfo {
    /// Start a new record for a track; `id` is assigned on insert.
    pub fn new(track_id: TrackId, hash: impl Into<String>) -> Self {
        Self {
            id: 0,
            track_id,
            hash: hash.into(),
            duration: 0.0,
            rate: 0,
            channels: 0,
            bitrate: 0,
            codec: None,
            codec_family: String::new(),
            codec_label: String::new(),
            waveform: None,
            waveform_err: None,
            processed_basic: ProcessingState::Waiting,
            processed_waveform: ProcessingState::Waiting,
            processing_start: None,
            processing_stop: None,
        }
    }

    /// Fill the codec columns from the track's MIME type.
    pub fn apply_codec_label(&mut self, mimetype: &str) {
        match codec_for_mime(mimetype) {
            Some(codec) => {
                self.codec_family = codec.family.to_string();
                self.codec_label = codec.label.to_string();
            }
            None => {
                self.codec_family.clear();
                self.codec_label.clear();
            }
        }
    }

    /// Record a successful waveform render.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = Some(waveform);
        self.waveform_err = None;
        self.processed_waveform = ProcessingState::Finished;
    }

    /// Record a failed waveform render.
    pub fn set_waveform_error(&mut self, error: impl Into<String>) {
        self.waveform = None;
        self.waveform_err = Some(error.into());
        self.processed_waveform = ProcessingState::Failed;
    }
}
