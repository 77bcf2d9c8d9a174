//! Submit processing jobs for existing tracks.
//!
//! Usage: `enqueue-track <track-id>...`

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use reel_models::TrackId;
use reel_queue::{QueueConfig, RedisConnector};
use reel_store::SqliteStore;
use reel_worker::{init_tracing, Dispatcher, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let ids = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse::<i64>()
                .map(TrackId)
                .with_context(|| format!("invalid track id: {}", arg))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if ids.is_empty() {
        anyhow::bail!("usage: enqueue-track <track-id>...");
    }

    let config = WorkerConfig::from_env();
    let store = Arc::new(
        SqliteStore::open(&config.database_url)
            .await
            .context("failed to open track database")?,
    );
    let dispatcher = Dispatcher::new(Arc::new(RedisConnector::new(QueueConfig::from_env())), store);

    let mut failed = 0;
    for id in ids {
        match dispatcher.enqueue(id).await {
            Ok(message_id) => info!(track_id = %id, message_id = %message_id, "Enqueued"),
            Err(e) => {
                warn!(track_id = %id, "Not enqueued, track marked for retry: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} track(s) left for the watchdog", failed);
    }
    Ok(())
}
