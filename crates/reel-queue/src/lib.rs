//! Redis Streams job queue.
//!
//! This crate provides:
//! - Job submission via Redis Streams
//! - The pending-job scan used by the watchdog
//! - Worker consumption, stale-job claiming and a failed-job record stream

pub mod broker;
pub mod error;
pub mod job;
pub mod queue;

pub use broker::{JobBroker, QueueConnector, RedisConnector};
pub use error::{QueueError, QueueResult};
pub use job::{QueueJob, TASK_NAME};
pub use queue::{redis_url, JobQueue, QueueConfig};
