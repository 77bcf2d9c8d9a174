//! SQLite-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info};

use reel_models::{
    Album, ProcessingState, TimelineItem, Track, TrackId, TrackInfo, TriState, Waveform,
};

use crate::error::{StoreError, StoreResult};
use crate::store::TrackStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS albums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        private INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        album_id INTEGER,
        album_order INTEGER,
        title TEXT NOT NULL,
        hash TEXT NOT NULL,
        filename TEXT NOT NULL,
        filename_orig TEXT NOT NULL,
        mimetype TEXT NOT NULL,
        transcode_needed INTEGER,
        transcode_state INTEGER NOT NULL DEFAULT 0,
        metadatas_state INTEGER NOT NULL DEFAULT 0,
        transcode_start INTEGER,
        transcode_stop INTEGER,
        ready INTEGER,
        private INTEGER,
        processing_error TEXT,
        track_info_id INTEGER,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS track_infos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER NOT NULL,
        hash TEXT NOT NULL,
        duration REAL NOT NULL DEFAULT 0,
        rate INTEGER NOT NULL DEFAULT 0,
        channels INTEGER NOT NULL DEFAULT 0,
        bitrate INTEGER NOT NULL DEFAULT 0,
        codec TEXT,
        codec_family TEXT NOT NULL DEFAULT '',
        codec_label TEXT NOT NULL DEFAULT '',
        waveform TEXT,
        waveform_err TEXT,
        processed_basic INTEGER NOT NULL DEFAULT 0,
        processed_waveform INTEGER NOT NULL DEFAULT 0,
        processing_start INTEGER,
        processing_stop INTEGER
    )
    "#,
    // 0 stands for "no track" / "no album" so the UNIQUE constraint applies.
    r#"
    CREATE TABLE IF NOT EXISTS timeline_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        track_id INTEGER NOT NULL DEFAULT 0,
        album_id INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, track_id, album_id)
    )
    "#,
];

const TRACK_COLUMNS: &str = "id, user_id, album_id, album_order, title, hash, filename, \
    filename_orig, mimetype, transcode_needed, transcode_state, metadatas_state, \
    transcode_start, transcode_stop, ready, private, processing_error, track_info_id, \
    version, created_at, updated_at";

const TRACK_INFO_COLUMNS: &str = "id, track_id, hash, duration, rate, channels, bitrate, codec, \
    codec_family, codec_label, waveform, waveform_err, processed_basic, processed_waveform, \
    processing_start, processing_stop";

/// Store on a SQLite database through a sqlx pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite://reel.db?mode=rwc`) and create missing tables.
    pub async fn open(url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!(url = %url, "Opened track database");
        Ok(store)
    }

    /// Private in-memory database. A single connection keeps every query on it.
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn init_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a user, returning its id.
    pub async fn create_user(&self, slug: &str) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO users (slug) VALUES (?)")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert an album, returning it with its assigned id.
    pub async fn create_album(&self, mut album: Album) -> StoreResult<Album> {
        let result = sqlx::query("INSERT INTO albums (user_id, title, private) VALUES (?, ?, ?)")
            .bind(album.user_id)
            .bind(&album.title)
            .bind(album.private.to_db())
            .execute(&self.pool)
            .await?;
        album.id = result.last_insert_rowid();
        Ok(album)
    }
}

fn state(row: &SqliteRow, column: &str) -> StoreResult<ProcessingState> {
    let code: i64 = row.try_get(column)?;
    Ok(ProcessingState::from_code(code)?)
}

fn tristate(row: &SqliteRow, column: &str) -> StoreResult<TriState> {
    Ok(TriState::from_db(row.try_get::<Option<bool>, _>(column)?))
}

/// Processing timestamps are stored as epoch seconds.
fn epoch_secs(time: Option<DateTime<Utc>>) -> Option<i64> {
    time.map(|t| t.timestamp())
}

fn epoch(row: &SqliteRow, column: &str) -> StoreResult<Option<DateTime<Utc>>> {
    match row.try_get::<Option<i64>, _>(column)? {
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| StoreError::invalid_row(format!("{} out of range: {}", column, secs))),
        None => Ok(None),
    }
}

fn track_from_row(row: &SqliteRow) -> StoreResult<Track> {
    Ok(Track {
        id: TrackId(row.try_get("id")?),
        user_id: row.try_get("user_id")?,
        album_id: row.try_get("album_id")?,
        album_order: row.try_get("album_order")?,
        title: row.try_get("title")?,
        hash: row.try_get("hash")?,
        filename: row.try_get("filename")?,
        filename_orig: row.try_get("filename_orig")?,
        mimetype: row.try_get("mimetype")?,
        transcode_needed: tristate(row, "transcode_needed")?,
        transcode_state: state(row, "transcode_state")?,
        metadatas_state: state(row, "metadatas_state")?,
        transcode_start: epoch(row, "transcode_start")?,
        transcode_stop: epoch(row, "transcode_stop")?,
        ready: tristate(row, "ready")?,
        private: tristate(row, "private")?,
        processing_error: row.try_get("processing_error")?,
        track_info_id: row.try_get("track_info_id")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn unsigned(row: &SqliteRow, column: &str) -> StoreResult<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| StoreError::invalid_row(format!("{} out of range: {}", column, value)))
}

fn track_info_from_row(row: &SqliteRow) -> StoreResult<TrackInfo> {
    let waveform = match row.try_get::<Option<String>, _>("waveform")? {
        Some(raw) => Some(serde_json::from_str::<Waveform>(&raw)?),
        None => None,
    };

    Ok(TrackInfo {
        id: row.try_get("id")?,
        track_id: TrackId(row.try_get("track_id")?),
        hash: row.try_get("hash")?,
        duration: row.try_get("duration")?,
        rate: unsigned(row, "rate")?,
        channels: unsigned(row, "channels")?,
        bitrate: unsigned(row, "bitrate")?,
        codec: row.try_get("codec")?,
        codec_family: row.try_get("codec_family")?,
        codec_label: row.try_get("codec_label")?,
        waveform,
        waveform_err: row.try_get("waveform_err")?,
        processed_basic: state(row, "processed_basic")?,
        processed_waveform: state(row, "processed_waveform")?,
        processing_start: epoch(row, "processing_start")?,
        processing_stop: epoch(row, "processing_stop")?,
    })
}

fn timeline_from_row(row: &SqliteRow) -> StoreResult<TimelineItem> {
    let track_id: i64 = row.try_get("track_id")?;
    let album_id: i64 = row.try_get("album_id")?;
    Ok(TimelineItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        track_id: (track_id != 0).then_some(TrackId(track_id)),
        album_id: (album_id != 0).then_some(album_id),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn waveform_json(info: &TrackInfo) -> StoreResult<Option<String>> {
    Ok(match &info.waveform {
        Some(waveform) => Some(serde_json::to_string(waveform)?),
        None => None,
    })
}

#[async_trait]
impl TrackStore for SqliteStore {
    async fn create_track(&self, mut track: Track) -> StoreResult<Track> {
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (user_id, album_id, album_order, title, hash, filename,
                filename_orig, mimetype, transcode_needed, transcode_state, metadatas_state,
                transcode_start, transcode_stop, ready, private, processing_error,
                track_info_id, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(track.user_id)
        .bind(track.album_id)
        .bind(track.album_order)
        .bind(&track.title)
        .bind(&track.hash)
        .bind(&track.filename)
        .bind(&track.filename_orig)
        .bind(&track.mimetype)
        .bind(track.transcode_needed.to_db())
        .bind(track.transcode_state.code())
        .bind(track.metadatas_state.code())
        .bind(epoch_secs(track.transcode_start))
        .bind(epoch_secs(track.transcode_stop))
        .bind(track.ready.to_db())
        .bind(track.private.to_db())
        .bind(&track.processing_error)
        .bind(track.track_info_id)
        .bind(track.created_at)
        .bind(track.updated_at)
        .execute(&self.pool)
        .await?;

        track.id = TrackId(result.last_insert_rowid());
        track.version = 0;
        debug!(track_id = %track.id, "Created track");
        Ok(track)
    }

    async fn get_track(&self, id: TrackId) -> StoreResult<Option<Track>> {
        let sql = format!("SELECT {} FROM tracks WHERE id = ?", TRACK_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(track_from_row).transpose()
    }

    async fn update_track(&self, track: &Track) -> StoreResult<Track> {
        let mut updated = track.clone();
        updated.version = track.version + 1;
        updated.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                user_id = ?, album_id = ?, album_order = ?, title = ?, hash = ?,
                filename = ?, filename_orig = ?, mimetype = ?, transcode_needed = ?,
                transcode_state = ?, metadatas_state = ?, transcode_start = ?,
                transcode_stop = ?, ready = ?, private = ?, processing_error = ?,
                track_info_id = ?, version = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(updated.user_id)
        .bind(updated.album_id)
        .bind(updated.album_order)
        .bind(&updated.title)
        .bind(&updated.hash)
        .bind(&updated.filename)
        .bind(&updated.filename_orig)
        .bind(&updated.mimetype)
        .bind(updated.transcode_needed.to_db())
        .bind(updated.transcode_state.code())
        .bind(updated.metadatas_state.code())
        .bind(epoch_secs(updated.transcode_start))
        .bind(epoch_secs(updated.transcode_stop))
        .bind(updated.ready.to_db())
        .bind(updated.private.to_db())
        .bind(&updated.processing_error)
        .bind(updated.track_info_id)
        .bind(updated.version)
        .bind(updated.updated_at)
        .bind(track.id.get())
        .bind(track.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?)")
                .bind(track.id.get())
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists {
                StoreError::Conflict {
                    track_id: track.id,
                    expected: track.version,
                }
            } else {
                StoreError::not_found(format!("track {}", track.id))
            });
        }

        Ok(updated)
    }

    async fn set_processing_states(
        &self,
        id: TrackId,
        transcode: Option<ProcessingState>,
        metadatas: Option<ProcessingState>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                transcode_state = COALESCE(?, transcode_state),
                metadatas_state = COALESCE(?, metadatas_state),
                version = version + 1,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(transcode.map(|s| s.code()))
        .bind(metadatas.map(|s| s.code()))
        .bind(Utc::now())
        .bind(id.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("track {}", id)));
        }
        Ok(())
    }

    async fn not_ready_tracks(&self) -> StoreResult<Vec<Track>> {
        let sql = format!(
            "SELECT {} FROM tracks WHERE ready IS NULL OR ready = 0 ORDER BY id",
            TRACK_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(track_from_row).collect()
    }

    async fn create_track_info(&self, mut info: TrackInfo) -> StoreResult<TrackInfo> {
        let waveform = waveform_json(&info)?;
        let result = sqlx::query(
            r#"
            INSERT INTO track_infos (track_id, hash, duration, rate, channels, bitrate, codec,
                codec_family, codec_label, waveform, waveform_err, processed_basic,
                processed_waveform, processing_start, processing_stop)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(info.track_id.get())
        .bind(&info.hash)
        .bind(info.duration)
        .bind(i64::from(info.rate))
        .bind(i64::from(info.channels))
        .bind(i64::from(info.bitrate))
        .bind(&info.codec)
        .bind(&info.codec_family)
        .bind(&info.codec_label)
        .bind(waveform)
        .bind(&info.waveform_err)
        .bind(info.processed_basic.code())
        .bind(info.processed_waveform.code())
        .bind(epoch_secs(info.processing_start))
        .bind(epoch_secs(info.processing_stop))
        .execute(&self.pool)
        .await?;

        info.id = result.last_insert_rowid();
        Ok(info)
    }

    async fn get_track_info(&self, id: i64) -> StoreResult<Option<TrackInfo>> {
        let sql = format!("SELECT {} FROM track_infos WHERE id = ?", TRACK_INFO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(track_info_from_row).transpose()
    }

    async fn update_track_info(&self, info: &TrackInfo) -> StoreResult<()> {
        let waveform = waveform_json(info)?;
        let result = sqlx::query(
            r#"
            UPDATE track_infos SET
                track_id = ?, hash = ?, duration = ?, rate = ?, channels = ?, bitrate = ?,
                codec = ?, codec_family = ?, codec_label = ?, waveform = ?, waveform_err = ?,
                processed_basic = ?, processed_waveform = ?, processing_start = ?,
                processing_stop = ?
            WHERE id = ?
            "#,
        )
        .bind(info.track_id.get())
        .bind(&info.hash)
        .bind(info.duration)
        .bind(i64::from(info.rate))
        .bind(i64::from(info.channels))
        .bind(i64::from(info.bitrate))
        .bind(&info.codec)
        .bind(&info.codec_family)
        .bind(&info.codec_label)
        .bind(waveform)
        .bind(&info.waveform_err)
        .bind(info.processed_basic.code())
        .bind(info.processed_waveform.code())
        .bind(epoch_secs(info.processing_start))
        .bind(epoch_secs(info.processing_stop))
        .bind(info.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("track info {}", info.id)));
        }
        Ok(())
    }

    async fn user_slug(&self, user_id: i64) -> StoreResult<Option<String>> {
        let slug = sqlx::query_scalar("SELECT slug FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(slug)
    }

    async fn get_album(&self, id: i64) -> StoreResult<Option<Album>> {
        let row = sqlx::query("SELECT id, user_id, title, private FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Album {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                title: row.try_get("title")?,
                private: tristate(&row, "private")?,
            })),
            None => Ok(None),
        }
    }

    async fn count_ready_tracks_in_album(&self, album_id: i64) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tracks WHERE album_id = ? AND ready = 1")
                .bind(album_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }

    async fn create_timeline_item(&self, item: TimelineItem) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO timeline_items (user_id, track_id, album_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(item.user_id)
        .bind(item.track_id.map(|id| id.get()).unwrap_or(0))
        .bind(item.album_id.unwrap_or(0))
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn timeline_items(&self) -> StoreResult<Vec<TimelineItem>> {
        let rows = sqlx::query(
            "SELECT id, user_id, track_id, album_id, created_at FROM timeline_items ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(timeline_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_user() -> (SqliteStore, i64) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user_id = store.create_user("dashie").await.unwrap();
        (store, user_id)
    }

    #[tokio::test]
    async fn test_track_roundtrips_through_sqlite() {
        let (store, user_id) = store_with_user().await;
        let mut track = Track::new_upload(user_id, "Song", "abc", "song.ogg", ".ogg", "audio/ogg");
        track.transcode_start = DateTime::from_timestamp(1_600_000_000, 0);

        let created = store.create_track(track.clone()).await.unwrap();
        let loaded = store.get_track(created.id).await.unwrap().unwrap();

        assert_eq!(loaded.title, "Song");
        assert_eq!(loaded.filename, "abc.ogg");
        assert_eq!(loaded.transcode_needed, TriState::Yes);
        assert_eq!(loaded.transcode_state, ProcessingState::Waiting);
        assert_eq!(loaded.transcode_start, track.transcode_start);
        assert_eq!(loaded.album_id, None);
        assert_eq!(store.user_slug(user_id).await.unwrap().as_deref(), Some("dashie"));
    }

    #[tokio::test]
    async fn test_processing_times_stored_as_epoch_seconds() {
        let (store, user_id) = store_with_user().await;
        let mut track = Track::new_upload(user_id, "Song", "abc", "song.ogg", ".ogg", "audio/ogg");
        track.transcode_start = DateTime::from_timestamp(1_600_000_000, 250_000_000);
        let track = store.create_track(track).await.unwrap();

        let mut info = store
            .create_track_info(TrackInfo::new(track.id, "abc"))
            .await
            .unwrap();
        info.processing_start = DateTime::from_timestamp(1_600_000_100, 0);
        store.update_track_info(&info).await.unwrap();

        let (kind, secs): (String, i64) =
            sqlx::query_as("SELECT typeof(transcode_start), transcode_start FROM tracks WHERE id = ?")
                .bind(track.id.get())
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(kind, "integer");
        assert_eq!(secs, 1_600_000_000);

        let loaded = store.get_track(track.id).await.unwrap().unwrap();
        assert_eq!(loaded.transcode_start, DateTime::from_timestamp(1_600_000_000, 0));
        assert_eq!(loaded.transcode_stop, None);

        let (kind, secs): (String, i64) = sqlx::query_as(
            "SELECT typeof(processing_start), processing_start FROM track_infos WHERE id = ?",
        )
        .bind(info.id)
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(kind, "integer");
        assert_eq!(secs, 1_600_000_100);

        let loaded = store.get_track_info(info.id).await.unwrap().unwrap();
        assert_eq!(loaded.processing_start, info.processing_start);
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("reel.db").display());

        let store = SqliteStore::open(&url).await.unwrap();
        let user_id = store.create_user("dashie").await.unwrap();
        let track = store
            .create_track(Track::new_upload(user_id, "Song", "h", "s.ogg", ".ogg", "audio/ogg"))
            .await
            .unwrap();
        store.pool().close().await;

        let reopened = SqliteStore::open(&url).await.unwrap();
        let loaded = reopened.get_track(track.id).await.unwrap();
        assert_eq!(loaded.map(|t| t.title), Some("Song".to_string()));
    }

    #[tokio::test]
    async fn test_versioned_update() {
        let (store, user_id) = store_with_user().await;
        let track = store
            .create_track(Track::new_upload(user_id, "Song", "h", "s.mp3", ".mp3", "audio/mpeg"))
            .await
            .unwrap();

        let mut ready = track.clone();
        ready.ready = TriState::Yes;
        ready.metadatas_state = ProcessingState::Finished;
        let stored = store.update_track(&ready).await.unwrap();
        assert_eq!(stored.version, 1);

        let err = store.update_track(&track).await.unwrap_err();
        assert!(err.is_conflict());

        let mut missing = track;
        missing.id = TrackId(999);
        let err = store.update_track(&missing).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert!(store.not_ready_tracks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_processing_states_is_partial() {
        let (store, user_id) = store_with_user().await;
        let track = store
            .create_track(Track::new_upload(user_id, "Song", "h", "s.ogg", ".ogg", "audio/ogg"))
            .await
            .unwrap();

        store
            .set_processing_states(track.id, Some(ProcessingState::Retrying), None)
            .await
            .unwrap();

        let loaded = store.get_track(track.id).await.unwrap().unwrap();
        assert_eq!(loaded.transcode_state, ProcessingState::Retrying);
        assert_eq!(loaded.metadatas_state, ProcessingState::Waiting);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_track_info_with_waveform() {
        let (store, user_id) = store_with_user().await;
        let track = store
            .create_track(Track::new_upload(user_id, "Song", "h", "s.ogg", ".ogg", "audio/ogg"))
            .await
            .unwrap();

        let mut info = store
            .create_track_info(TrackInfo::new(track.id, "h"))
            .await
            .unwrap();
        info.duration = 12.5;
        info.channels = 2;
        info.apply_codec_label("audio/ogg");
        info.set_waveform(Waveform {
            version: 2,
            channels: 1,
            sample_rate: 44100,
            samples_per_pixel: 4410,
            bits: 8,
            length: 1,
            data: vec![-1, 1],
        });
        store.update_track_info(&info).await.unwrap();

        let loaded = store.get_track_info(info.id).await.unwrap().unwrap();
        assert_eq!(loaded, info);
    }

    #[tokio::test]
    async fn test_timeline_uniqueness_and_album_counts() {
        let (store, user_id) = store_with_user().await;
        let album = store
            .create_album(Album {
                id: 0,
                user_id,
                title: "LP".into(),
                private: TriState::No,
            })
            .await
            .unwrap();

        let mut track = store
            .create_track(
                Track::new_upload(user_id, "Song", "h", "s.mp3", ".mp3", "audio/mpeg")
                    .with_album(album.id, 1),
            )
            .await
            .unwrap();
        track.ready = TriState::Yes;
        store.update_track(&track).await.unwrap();
        assert_eq!(store.count_ready_tracks_in_album(album.id).await.unwrap(), 1);
        assert_eq!(store.get_album(album.id).await.unwrap(), Some(album.clone()));

        assert!(store
            .create_timeline_item(TimelineItem::for_track(user_id, track.id))
            .await
            .unwrap());
        assert!(!store
            .create_timeline_item(TimelineItem::for_track(user_id, track.id))
            .await
            .unwrap());
        assert!(store
            .create_timeline_item(TimelineItem::for_album(user_id, album.id))
            .await
            .unwrap());

        let items = store.timeline_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].album_id, Some(album.id));
        assert_eq!(items[0].track_id, None);
        assert_eq!(items[1].track_id, Some(track.id));
    }
}
