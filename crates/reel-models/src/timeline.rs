//! Albums and the public activity feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TriState;
use crate::track::TrackId;

/// Album a track can belong to. Only visibility matters to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub private: TriState,
}

impl Album {
    pub fn is_private(&self) -> bool {
        self.private.is_yes()
    }
}

/// One entry of the public timeline: either a track or an album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: i64,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<TrackId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TimelineItem {
    pub fn for_track(user_id: i64, track_id: TrackId) -> Self {
        Self {
            id: 0,
            user_id,
            track_id: Some(track_id),
            album_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_album(user_id: i64, album_id: i64) -> Self {
        Self {
            id: 0,
            user_id,
            track_id: None,
            album_id: Some(album_id),
            created_at: Utc::now(),
        }
    }

    /// Two items are duplicates when they point at the same thing.
    pub fn same_target(&self, other: &TimelineItem) -> bool {
        self.user_id == other.user_id
            && self.track_id == other.track_id
            && self.album_id == other.album_id
    }
}
