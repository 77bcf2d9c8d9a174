//! Timeline fan-out for newly ready tracks.

use std::sync::Arc;

use tracing::{debug, info};

use reel_models::{TimelineItem, Track};
use reel_store::TrackStore;

use crate::error::WorkerResult;

/// Publishes ready tracks, and the album of a first ready track, to the public timeline.
#[derive(Clone)]
pub struct TimelineFanout {
    store: Arc<dyn TrackStore>,
}

impl TimelineFanout {
    pub fn new(store: Arc<dyn TrackStore>) -> Self {
        Self { store }
    }

    /// Publish a track that was just marked ready.
    ///
    /// Must run after the ready flag is persisted. The album entry is added
    /// once the album holds a ready track; the store drops repeated entries,
    /// so every worker finalizing a track of the album may attempt it.
    pub async fn publish(&self, track: &Track) -> WorkerResult<()> {
        if track.is_private() {
            debug!(track_id = %track.id, "Private track, not published");
            return Ok(());
        }

        let created = self
            .store
            .create_timeline_item(TimelineItem::for_track(track.user_id, track.id))
            .await?;
        if created {
            info!(track_id = %track.id, user_id = track.user_id, "Published track to timeline");
        }

        let Some(album_id) = track.album_id else {
            return Ok(());
        };
        let Some(album) = self.store.get_album(album_id).await? else {
            debug!(track_id = %track.id, album_id, "Album not found, skipping album entry");
            return Ok(());
        };
        if album.is_private() {
            return Ok(());
        }

        if self.store.count_ready_tracks_in_album(album_id).await? >= 1 {
            let created = self
                .store
                .create_timeline_item(TimelineItem::for_album(album.user_id, album_id))
                .await?;
            if created {
                info!(album_id, user_id = album.user_id, "Published album to timeline");
            }
        }

        Ok(())
    }
}
