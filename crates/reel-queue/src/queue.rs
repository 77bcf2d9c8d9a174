//! Job queue using Redis Streams.

use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamRangeReply, StreamReadReply,
};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// Build a Redis URL from a host/port/logical-db triple.
pub fn redis_url(host: &str, port: u16, db: i64) -> String {
    format!("redis://{}:{}/{}", host, port, db)
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Stream where failed jobs are recorded for inspection
    pub failed_stream_name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: redis_url("localhost", 6379, 0),
            stream_name: "reel:transcoding".to_string(),
            consumer_group: "reel:workers".to_string(),
            failed_stream_name: "reel:failed".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    ///
    /// `REDIS_URL` wins over `REDIS_HOST`/`REDIS_PORT`/`REDIS_DB`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| {
            let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port = std::env::var("REDIS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6379);
            let db = std::env::var("REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            redis_url(&host, port, db)
        });

        Self {
            redis_url,
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            failed_stream_name: std::env::var("QUEUE_FAILED_STREAM")
                .unwrap_or(defaults.failed_stream_name),
        }
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Open the client, check the server answers and create the consumer group
    /// if it does not exist yet. Does not retry.
    pub async fn connect(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(format!("{}: {}", config.redis_url, e)))?;
        let queue = Self { client, config };

        let mut conn = queue
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;

        queue.init().await?;
        Ok(queue)
    }

    /// Create from environment variables.
    pub async fn from_env() -> QueueResult<Self> {
        Self::connect(QueueConfig::from_env()).await
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create the consumer group if it does not exist.
    async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // Start at 0 so jobs submitted before the first worker are still delivered.
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Submit a job. Returns the stream message id.
    pub async fn submit(&self, job: &QueueJob) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::submit_failed(e.to_string()))?;

        info!(
            track_id = %job.track_id(),
            task = job.task_name(),
            message_id = %message_id,
            "Submitted job"
        );

        Ok(message_id)
    }

    /// Every job still in the stream: not yet delivered, or delivered and not
    /// yet acknowledged. Acknowledged jobs are deleted from the stream.
    pub async fn pending_jobs(&self) -> QueueResult<Vec<QueueJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: StreamRangeReply = conn.xrange_all(&self.config.stream_name).await?;

        Ok(reply.ids.iter().filter_map(parse_entry).collect())
    }

    /// Acknowledge a job and remove it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged job: {}", message_id);
        Ok(())
    }

    /// Record a failed job on the failed stream and acknowledge it.
    ///
    /// The job is not retried; the watchdog re-submits the track if it is
    /// still not ready.
    pub async fn record_failure(
        &self,
        message_id: &str,
        job: &QueueJob,
        error: &str,
    ) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload = serde_json::to_string(job)?;
        redis::cmd("XADD")
            .arg(&self.config.failed_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(message_id).await?;

        warn!(track_id = %job.track_id(), error = %error, "Recorded failed job");
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get failed stream length.
    pub async fn failed_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.failed_stream_name).await?;
        Ok(len)
    }

    /// Read new jobs for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();
        for stream_key in result.keys {
            jobs.extend(self.collect_entries(stream_key.ids).await);
        }

        Ok(jobs)
    }

    /// Claim jobs delivered to another consumer that have been idle for at
    /// least `min_idle_ms`. This handles jobs from crashed workers.
    pub async fn claim_stale(
        &self,
        consumer_name: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, QueueJob)>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let stale: Vec<&str> = pending
            .ids
            .iter()
            .filter(|p| p.last_delivered_ms as u64 >= min_idle_ms)
            .map(|p| p.id.as_str())
            .collect();

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let result: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg(&stale)
            .query_async(&mut conn)
            .await?;

        let jobs = self.collect_entries(result.ids).await;
        if !jobs.is_empty() {
            info!(count = jobs.len(), "Claimed stale jobs");
        }
        Ok(jobs)
    }

    /// Decode stream entries, dropping (and acknowledging) malformed ones.
    async fn collect_entries(&self, entries: Vec<StreamId>) -> Vec<(String, QueueJob)> {
        let mut jobs = Vec::with_capacity(entries.len());
        for entry in entries {
            match parse_entry(&entry) {
                Some(job) => {
                    debug!(track_id = %job.track_id(), "Consumed job {}", entry.id);
                    jobs.push((entry.id, job));
                }
                None => {
                    // Ack the malformed message to prevent reprocessing
                    self.ack(&entry.id).await.ok();
                }
            }
        }
        jobs
    }
}

fn parse_entry(entry: &StreamId) -> Option<QueueJob> {
    let payload: String = entry.get("job")?;
    match serde_json::from_str::<QueueJob>(&payload) {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(message_id = %entry.id, "Failed to parse job payload: {}", e);
            None
        }
    }
}
