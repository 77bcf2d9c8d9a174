//! In-process store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use reel_models::{Album, ProcessingState, TimelineItem, Track, TrackId, TrackInfo};

use crate::error::{StoreError, StoreResult};
use crate::store::TrackStore;

#[derive(Debug, Default)]
struct Inner {
    tracks: BTreeMap<i64, Track>,
    infos: BTreeMap<i64, TrackInfo>,
    users: HashMap<i64, String>,
    albums: HashMap<i64, Album>,
    timeline: Vec<TimelineItem>,
    last_track_id: i64,
    last_info_id: i64,
    last_timeline_id: i64,
}

/// Store kept entirely in memory. Same semantics as `SqliteStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and its storage slug.
    pub async fn add_user(&self, user_id: i64, slug: impl Into<String>) {
        self.inner.write().await.users.insert(user_id, slug.into());
    }

    /// Register an album.
    pub async fn add_album(&self, album: Album) {
        self.inner.write().await.albums.insert(album.id, album);
    }

    /// Number of TrackInfo rows.
    pub async fn track_info_count(&self) -> usize {
        self.inner.read().await.infos.len()
    }
}

#[async_trait]
impl TrackStore for MemoryStore {
    async fn create_track(&self, mut track: Track) -> StoreResult<Track> {
        let mut inner = self.inner.write().await;
        inner.last_track_id += 1;
        track.id = TrackId(inner.last_track_id);
        track.version = 0;
        inner.tracks.insert(track.id.get(), track.clone());
        debug!(track_id = %track.id, "Created track");
        Ok(track)
    }

    async fn get_track(&self, id: TrackId) -> StoreResult<Option<Track>> {
        Ok(self.inner.read().await.tracks.get(&id.get()).cloned())
    }

    async fn update_track(&self, track: &Track) -> StoreResult<Track> {
        let mut inner = self.inner.write().await;
        let current = inner
            .tracks
            .get_mut(&track.id.get())
            .ok_or_else(|| StoreError::not_found(format!("track {}", track.id)))?;

        if current.version != track.version {
            return Err(StoreError::Conflict {
                track_id: track.id,
                expected: track.version,
            });
        }

        let mut updated = track.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *current = updated.clone();
        Ok(updated)
    }

    async fn set_processing_states(
        &self,
        id: TrackId,
        transcode: Option<ProcessingState>,
        metadatas: Option<ProcessingState>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let track = inner
            .tracks
            .get_mut(&id.get())
            .ok_or_else(|| StoreError::not_found(format!("track {}", id)))?;

        if let Some(state) = transcode {
            track.transcode_state = state;
        }
        if let Some(state) = metadatas {
            track.metadatas_state = state;
        }
        track.version += 1;
        Ok(())
    }

    async fn not_ready_tracks(&self) -> StoreResult<Vec<Track>> {
        Ok(self
            .inner
            .read()
            .await
            .tracks
            .values()
            .filter(|t| !t.is_ready())
            .cloned()
            .collect())
    }

    async fn create_track_info(&self, mut info: TrackInfo) -> StoreResult<TrackInfo> {
        let mut inner = self.inner.write().await;
        inner.last_info_id += 1;
        info.id = inner.last_info_id;
        inner.infos.insert(info.id, info.clone());
        Ok(info)
    }

    async fn get_track_info(&self, id: i64) -> StoreResult<Option<TrackInfo>> {
        Ok(self.inner.read().await.infos.get(&id).cloned())
    }

    async fn update_track_info(&self, info: &TrackInfo) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.infos.get_mut(&info.id) {
            Some(current) => {
                *current = info.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(format!("track info {}", info.id))),
        }
    }

    async fn user_slug(&self, user_id: i64) -> StoreResult<Option<String>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn get_album(&self, id: i64) -> StoreResult<Option<Album>> {
        Ok(self.inner.read().await.albums.get(&id).cloned())
    }

    async fn count_ready_tracks_in_album(&self, album_id: i64) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        let count = inner
            .tracks
            .values()
            .filter(|t| t.album_id == Some(album_id) && t.is_ready())
            .count();
        Ok(count as u64)
    }

    async fn create_timeline_item(&self, mut item: TimelineItem) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.timeline.iter().any(|existing| existing.same_target(&item)) {
            return Ok(false);
        }
        inner.last_timeline_id += 1;
        item.id = inner.last_timeline_id;
        inner.timeline.push(item);
        Ok(true)
    }

    async fn timeline_items(&self) -> StoreResult<Vec<TimelineItem>> {
        let mut items = self.inner.read().await.timeline.clone();
        items.reverse();
        Ok(items)
    }
}
