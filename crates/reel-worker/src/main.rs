//! Audio processing worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use reel_media::CliAudioTools;
use reel_queue::{JobQueue, QueueConfig, RedisConnector};
use reel_store::SqliteStore;
use reel_worker::{init_tracing, metrics, JobExecutor, Pipeline, Watchdog, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting reel-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port).context("failed to install Prometheus exporter")?;
        info!(port, "Serving Prometheus metrics");
    }

    tokio::fs::create_dir_all(&config.storage_path)
        .await
        .with_context(|| format!("cannot create storage dir {}", config.storage_path.display()))?;

    let store = Arc::new(
        SqliteStore::open(&config.database_url)
            .await
            .context("failed to open track database")?,
    );

    let tools = CliAudioTools::new(config.tools.clone());
    for (name, check) in tools.check_available() {
        if let Err(e) = check {
            error!(tool = name, "Tool unavailable: {}", e);
        }
    }

    let queue_config = QueueConfig::from_env();
    let queue = JobQueue::connect(queue_config.clone())
        .await
        .context("failed to connect to the job queue")?;

    let pipeline = Pipeline::new(store.clone(), Arc::new(tools), config.storage_path.clone());
    let watchdog = Watchdog::new(Arc::new(RedisConnector::new(queue_config)), store);
    let executor = Arc::new(JobExecutor::new(config, queue, pipeline, watchdog));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

