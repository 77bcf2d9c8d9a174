//! Job payloads carried on the stream.

use serde::{Deserialize, Deserializer, Serialize};

use reel_models::TrackId;

/// Name of the only task the workers run.
pub const TASK_NAME: &str = "transcode_and_fetch_infos";

/// A queued job. It references the track by id only; workers reload
/// everything else from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum QueueJob {
    /// Probe, transcode and render the waveform of one track
    TranscodeAndFetchInfos {
        #[serde(deserialize_with = "lenient_track_id")]
        track_id: TrackId,
    },
}

impl QueueJob {
    pub fn transcode_and_fetch_infos(track_id: TrackId) -> Self {
        QueueJob::TranscodeAndFetchInfos { track_id }
    }

    pub fn track_id(&self) -> TrackId {
        match self {
            QueueJob::TranscodeAndFetchInfos { track_id } => *track_id,
        }
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            QueueJob::TranscodeAndFetchInfos { .. } => TASK_NAME,
        }
    }
}

/// Accept the id as a JSON number or as a numeric string.
fn lenient_track_id<'de, D>(deserializer: D) -> Result<TrackId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(TrackId(id)),
        RawId::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(TrackId)
            .map_err(serde::de::Error::custom),
    }
}
