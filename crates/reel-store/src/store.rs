//! The store trait shared by the dispatcher, pipeline and watchdog.

use async_trait::async_trait;

use reel_models::{Album, ProcessingState, TimelineItem, Track, TrackId, TrackInfo};

use crate::error::StoreResult;

/// Persistence seam for tracks, their derived info and the timeline.
///
/// Writes are single-row read-modify-write. `update_track` is versioned: it
/// fails with `StoreError::Conflict` when the row changed since it was read.
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Insert a new track, assigning its id.
    async fn create_track(&self, track: Track) -> StoreResult<Track>;

    /// Get a track by id.
    async fn get_track(&self, id: TrackId) -> StoreResult<Option<Track>>;

    /// Write every column of a track. Returns the stored row with its new version.
    async fn update_track(&self, track: &Track) -> StoreResult<Track>;

    /// Update only the state columns that are `Some`, leaving the rest of the row alone.
    async fn set_processing_states(
        &self,
        id: TrackId,
        transcode: Option<ProcessingState>,
        metadatas: Option<ProcessingState>,
    ) -> StoreResult<()>;

    /// Every track whose `ready` flag is not set, ordered by id.
    async fn not_ready_tracks(&self) -> StoreResult<Vec<Track>>;

    /// Insert a TrackInfo, assigning its id.
    async fn create_track_info(&self, info: TrackInfo) -> StoreResult<TrackInfo>;

    /// Get a TrackInfo by id.
    async fn get_track_info(&self, id: i64) -> StoreResult<Option<TrackInfo>>;

    /// Write every column of a TrackInfo.
    async fn update_track_info(&self, info: &TrackInfo) -> StoreResult<()>;

    /// Storage slug of a user.
    async fn user_slug(&self, user_id: i64) -> StoreResult<Option<String>>;

    /// Get an album by id.
    async fn get_album(&self, id: i64) -> StoreResult<Option<Album>>;

    /// Number of ready tracks in an album.
    async fn count_ready_tracks_in_album(&self, album_id: i64) -> StoreResult<u64>;

    /// Add a timeline entry. Returns `false` if the same entry already exists.
    async fn create_timeline_item(&self, item: TimelineItem) -> StoreResult<bool>;

    /// Timeline entries, newest first.
    async fn timeline_items(&self) -> StoreResult<Vec<TimelineItem>>;
}
