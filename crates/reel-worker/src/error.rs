//! Worker error types.

use thiserror::Error;

use reel_models::TrackId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// A business rule rejected the file; the track is parked for good.
    #[error("Track {track_id} rejected: {reason}")]
    TrackRejected { track_id: TrackId, reason: String },

    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Store error: {0}")]
    Store(#[from] reel_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),
}

impl WorkerError {
    pub fn rejected(track_id: TrackId, reason: impl Into<String>) -> Self {
        Self::TrackRejected {
            track_id,
            reason: reason.into(),
        }
    }

    /// Failures that reprocessing cannot fix.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerError::TrackRejected { .. })
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::TrackRejected { .. } => "rejected",
            WorkerError::UserNotFound(_) => "user_not_found",
            WorkerError::Store(_) => "store",
            WorkerError::Media(_) => "media",
            WorkerError::Queue(_) => "queue",
        }
    }
}
