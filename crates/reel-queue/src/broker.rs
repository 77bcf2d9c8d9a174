//! Broker seams used by the dispatcher and the watchdog.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::QueueResult;
use crate::job::QueueJob;
use crate::queue::{JobQueue, QueueConfig};

/// The two broker operations the producers need.
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Submit a job, returning the broker's message id.
    async fn submit(&self, job: &QueueJob) -> QueueResult<String>;

    /// Jobs submitted but not yet acknowledged by a worker.
    async fn pending_jobs(&self) -> QueueResult<Vec<QueueJob>>;
}

/// Opens a broker handle. Failures are returned, never retried.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn connect(&self) -> QueueResult<Arc<dyn JobBroker>>;
}

#[async_trait]
impl JobBroker for JobQueue {
    async fn submit(&self, job: &QueueJob) -> QueueResult<String> {
        JobQueue::submit(self, job).await
    }

    async fn pending_jobs(&self) -> QueueResult<Vec<QueueJob>> {
        JobQueue::pending_jobs(self).await
    }
}

/// Connects a fresh [`JobQueue`] on every call.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    config: QueueConfig,
}

impl RedisConnector {
    pub fn new(config: QueueConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl QueueConnector for RedisConnector {
    async fn connect(&self) -> QueueResult<Arc<dyn JobBroker>> {
        let queue = JobQueue::connect(self.config.clone()).await?;
        Ok(Arc::new(queue))
    }
}
