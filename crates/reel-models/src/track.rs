//! Track model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{ProcessingState, TriState};

/// Delivery format every track ends up in; uploads in this format skip transcoding.
pub const CANONICAL_MIMETYPE: &str = "audio/mpeg";

/// Diagnostic stored on tracks rejected by the channel-count rule.
pub const CHANNEL_LIMIT_ERROR: &str = "cannot process files with more than two channels";

/// Unique identifier for a track row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl TrackId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One uploaded audio asset and its processing/visibility state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,

    /// Owner
    pub user_id: i64,

    /// Album membership
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_order: Option<i64>,

    pub title: String,

    /// Content hash, also the stem of the stored filename
    pub hash: String,
    /// `<hash><ext>` on disk
    pub filename: String,
    /// Name the file was uploaded with
    pub filename_orig: String,
    /// Detected MIME type
    pub mimetype: String,

    pub transcode_needed: TriState,
    pub transcode_state: ProcessingState,
    pub metadatas_state: ProcessingState,

    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub transcode_start: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub transcode_stop: Option<DateTime<Utc>>,

    /// Servable to end users. Only the pipeline's finalize step sets this.
    pub ready: TriState,
    pub private: TriState,

    /// Diagnostic surfaced to the owner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,

    /// Linked once the TrackInfo row exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_info_id: Option<i64>,

    /// Optimistic concurrency counter, bumped on every write
    #[serde(default)]
    pub version: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Track {
    /// Build the row the upload handler inserts for a freshly stored file.
    ///
    /// `extension` includes the leading dot (".ogg").
    pub fn new_upload(
        user_id: i64,
        title: impl Into<String>,
        hash: impl Into<String>,
        filename_orig: impl Into<String>,
        extension: &str,
        mimetype: impl Into<String>,
    ) -> Self {
        let hash = hash.into();
        let mimetype = mimetype.into();
        let transcode_needed = mimetype != CANONICAL_MIMETYPE;
        let now = Utc::now();

        Self {
            id: TrackId(0),
            user_id,
            album_id: None,
            album_order: None,
            title: title.into(),
            filename: format!("{}{}", hash, extension),
            hash,
            filename_orig: filename_orig.into(),
            mimetype,
            transcode_needed: TriState::from(transcode_needed),
            transcode_state: if transcode_needed {
                ProcessingState::Waiting
            } else {
                ProcessingState::NotNeeded
            },
            metadatas_state: ProcessingState::Waiting,
            transcode_start: None,
            transcode_stop: None,
            ready: TriState::No,
            private: TriState::No,
            processing_error: None,
            track_info_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Put the track in an album at the given position.
    pub fn with_album(mut self, album_id: i64, order: i64) -> Self {
        self.album_id = Some(album_id);
        self.album_order = Some(order);
        self
    }

    /// Set visibility.
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = TriState::from(private);
        self
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_yes()
    }

    pub fn is_private(&self) -> bool {
        self.private.is_yes()
    }

    pub fn needs_transcode(&self) -> bool {
        self.transcode_needed.is_yes()
    }

    /// Rejected by a business rule; never re-dispatched.
    pub fn is_terminally_failed(&self) -> bool {
        self.transcode_state == ProcessingState::Failed && self.processing_error.is_some()
    }

    /// `ready` implies both sub-states are done.
    pub fn readiness_invariant_holds(&self) -> bool {
        !self.is_ready()
            || (self.transcode_state.is_done()
                && self.metadatas_state == ProcessingState::Finished)
    }

    /// Apply the terminal, fail-closed state used when the file is rejected.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.ready = TriState::No;
        self.transcode_state = ProcessingState::Failed;
        self.processing_error = Some(reason.into());
        self.private = TriState::Yes;
    }
}
