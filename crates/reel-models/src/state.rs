//! Processing state enumerations shared by Track and TrackInfo.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A persisted state code that does not map to any known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid processing state code: {0}")]
pub struct InvalidStateCode(pub i64);

/// State of one processing step (metadata, transcode, waveform).
///
/// The same enumeration is used for `Track::transcode_state`,
/// `Track::metadatas_state` and both `TrackInfo` result flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    /// Queued, nothing done yet
    #[default]
    Waiting,
    /// A worker picked the step up
    Started,
    /// The step failed
    Failed,
    /// The step completed
    Finished,
    /// The step is not required for this track
    NotNeeded,
    /// Dispatch failed, waiting for the watchdog to re-enqueue
    Retrying,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Waiting => "waiting",
            ProcessingState::Started => "started",
            ProcessingState::Failed => "failed",
            ProcessingState::Finished => "finished",
            ProcessingState::NotNeeded => "not_needed",
            ProcessingState::Retrying => "retrying",
        }
    }

    /// Stable integer code used at the persistence boundary.
    pub fn code(&self) -> i64 {
        match self {
            ProcessingState::Waiting => 0,
            ProcessingState::Started => 1,
            ProcessingState::Failed => 2,
            ProcessingState::Finished => 3,
            ProcessingState::NotNeeded => 4,
            ProcessingState::Retrying => 5,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, InvalidStateCode> {
        match code {
            0 => Ok(ProcessingState::Waiting),
            1 => Ok(ProcessingState::Started),
            2 => Ok(ProcessingState::Failed),
            3 => Ok(ProcessingState::Finished),
            4 => Ok(ProcessingState::NotNeeded),
            5 => Ok(ProcessingState::Retrying),
            other => Err(InvalidStateCode(other)),
        }
    }

    /// Whether the step no longer blocks readiness.
    pub fn is_done(&self) -> bool {
        matches!(self, ProcessingState::Finished | ProcessingState::NotNeeded)
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A boolean that distinguishes "false" from "never set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    #[default]
    Unset,
    No,
    Yes,
}

impl TriState {
    pub fn is_yes(&self) -> bool {
        matches!(self, TriState::Yes)
    }

    /// Persisted as NULL / 0 / 1.
    pub fn to_db(&self) -> Option<bool> {
        match self {
            TriState::Unset => None,
            TriState::No => Some(false),
            TriState::Yes => Some(true),
        }
    }

    pub fn from_db(value: Option<bool>) -> Self {
        match value {
            None => TriState::Unset,
            Some(false) => TriState::No,
            Some(true) => TriState::Yes,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::Yes
        } else {
            TriState::No
        }
    }
}
