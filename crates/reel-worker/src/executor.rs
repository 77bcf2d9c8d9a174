//! Job executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use reel_queue::{JobQueue, QueueJob};

use crate::backoff::{settle, ErrorStreak};
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::Pipeline;
use crate::watchdog::Watchdog;

/// Maximum jobs read per consume call.
const CONSUME_BATCH: usize = 5;

/// Consumes jobs from the queue and runs them through the pipeline.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: Arc<Pipeline>,
    watchdog: Arc<Watchdog>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, pipeline: Pipeline, watchdog: Watchdog) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            pipeline: Arc::new(pipeline),
            watchdog: Arc::new(watchdog),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`shutdown`](Self::shutdown) is called, then wait for
    /// in-flight jobs up to the configured shutdown timeout.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        let watchdog_task = tokio::spawn(
            Arc::clone(&self.watchdog).run_schedule(self.config.watchdog, self.shutdown.subscribe()),
        );
        let claim_task = tokio::spawn(Self::claim_loop(
            Arc::clone(&self.queue),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.job_semaphore),
            self.consumer_name.clone(),
            self.config.clone(),
            self.shutdown.subscribe(),
        ));

        let mut errors = ErrorStreak::new(3);
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    match result {
                        Ok(()) => errors.recovered(),
                        Err(e) => {
                            if errors.failed() {
                                error!("Error consuming jobs: {}", e);
                            }
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        claim_task.abort();
        watchdog_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "Shutdown timeout of {:?} reached with jobs still running",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and dispatch up to the number of free slots.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                self.config.consume_block.as_millis() as u64,
                available.min(CONSUME_BATCH),
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let Ok(permit) = Arc::clone(&self.job_semaphore).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&self.pipeline);
            let queue = Arc::clone(&self.queue);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(pipeline, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Periodically take over jobs held by consumers that stopped responding.
    async fn claim_loop(
        queue: Arc<JobQueue>,
        pipeline: Arc<Pipeline>,
        semaphore: Arc<Semaphore>,
        consumer_name: String,
        config: WorkerConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(config.claim_interval);
        let min_idle_ms = config.claim_min_idle.as_millis() as u64;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    match queue.claim_stale(&consumer_name, min_idle_ms, CONSUME_BATCH).await {
                        Ok(jobs) if !jobs.is_empty() => {
                            info!("Claimed {} stale jobs", jobs.len());
                            for (message_id, job) in jobs {
                                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                    break;
                                };
                                let pipeline = Arc::clone(&pipeline);
                                let queue = Arc::clone(&queue);

                                tokio::spawn(async move {
                                    let _permit = permit;
                                    Self::execute_job(pipeline, queue, message_id, job).await;
                                });
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Failed to claim stale jobs: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Run one job, then ack it or record the failure. Failed jobs are not
    /// redelivered; the watchdog picks the track up again.
    async fn execute_job(
        pipeline: Arc<Pipeline>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
    ) {
        let track_id = job.track_id();
        let started = Instant::now();
        info!(track_id = %track_id, message_id = %message_id, "Executing {}", job.task_name());

        match pipeline.process(track_id).await {
            Ok(outcome) => {
                metrics::record_job(outcome.as_str(), started.elapsed().as_secs_f64());
                info!(track_id = %track_id, outcome = outcome.as_str(), "Job finished");

                if let Err(e) = settle("ack", track_id, || queue.ack(&message_id)).await {
                    error!(track_id = %track_id, "Failed to ack job {}: {}", message_id, e);
                }
            }
            Err(e) => {
                let outcome = if e.is_terminal() { "rejected" } else { "failed" };
                metrics::record_job(outcome, started.elapsed().as_secs_f64());
                error!(track_id = %track_id, kind = e.kind(), "Job failed: {}", e);

                let reason = e.to_string();
                if let Err(record_err) = settle("record_failure", track_id, || {
                    queue.record_failure(&message_id, &job, &reason)
                })
                .await
                {
                    error!(
                        track_id = %track_id,
                        "Failed to record failed job {}: {}", message_id, record_err
                    );
                }
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
