use std::path::Path;

use reel_media::CliAudioTools;
use reel_queue::{JobQueue, QueueConfig};
use reel_store::SqliteStore;
use reel_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with storage_path={}",
        config.storage_path.display()
    );
    ensure_storage(&config.storage_path).await?;
    ensure_tools(&CliAudioTools::new(config.tools.clone()))?;
    ensure_database(&config.database_url).await?;
    ensure_broker().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_storage(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path.join("tracks")).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("storage dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_tools(tools: &CliAudioTools) -> anyhow::Result<()> {
    let mut missing = Vec::new();
    for (name, check) in tools.check_available() {
        match check {
            Ok(path) => println!("worker-selfcheck: {} at {}", name, path.display()),
            Err(e) => missing.push(format!("{} ({})", name, e)),
        }
    }

    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing tools: {}", missing.join(", ")));
    }
    Ok(())
}

async fn ensure_database(url: &str) -> anyhow::Result<()> {
    SqliteStore::open(url)
        .await
        .map_err(|e| anyhow::anyhow!("database {} unavailable: {}", url, e))?;
    Ok(())
}

async fn ensure_broker() -> anyhow::Result<()> {
    let queue = JobQueue::connect(QueueConfig::from_env())
        .await
        .map_err(|e| anyhow::anyhow!("broker unavailable: {}", e))?;
    let pending = queue.len().await?;
    let failed = queue.failed_len().await?;
    println!(
        "worker-selfcheck: stream {} has {} entries, {} failed",
        queue.config().stream_name,
        pending,
        failed
    );
    Ok(())
}
