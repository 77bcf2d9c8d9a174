//! Best-effort job submission for the upload path.

use std::sync::Arc;

use tracing::{info, warn};

use reel_models::{ProcessingState, TrackId};
use reel_queue::{QueueConnector, QueueJob};
use reel_store::TrackStore;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Enqueues processing jobs. When the broker cannot be reached the track is
/// marked `Retrying` and left for the watchdog.
#[derive(Clone)]
pub struct Dispatcher {
    connector: Arc<dyn QueueConnector>,
    store: Arc<dyn TrackStore>,
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn QueueConnector>, store: Arc<dyn TrackStore>) -> Self {
        Self { connector, store }
    }

    /// Submit a job for `track_id`, returning the broker message id.
    ///
    /// A broker error is returned to the caller after the fallback states are
    /// stored. The caller should warn the user, not fail the upload.
    pub async fn enqueue(&self, track_id: TrackId) -> WorkerResult<String> {
        let job = QueueJob::transcode_and_fetch_infos(track_id);

        let submitted = match self.connector.connect().await {
            Ok(broker) => broker.submit(&job).await,
            Err(e) => Err(e),
        };

        match submitted {
            Ok(message_id) => {
                info!(track_id = %track_id, message_id = %message_id, "Enqueued track");
                Ok(message_id)
            }
            Err(e) => {
                warn!(track_id = %track_id, error = %e, "Enqueue failed, marking track for retry");
                metrics::record_dispatch_fallback();
                self.mark_retrying(track_id).await?;
                Err(WorkerError::from(e))
            }
        }
    }

    async fn mark_retrying(&self, track_id: TrackId) -> WorkerResult<()> {
        let Some(track) = self.store.get_track(track_id).await? else {
            warn!(track_id = %track_id, "Track vanished before it could be marked for retry");
            return Ok(());
        };

        let transcode = track.needs_transcode().then_some(ProcessingState::Retrying);
        self.store
            .set_processing_states(track_id, transcode, Some(ProcessingState::Retrying))
            .await?;
        Ok(())
    }
}
