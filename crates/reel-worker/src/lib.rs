//! Audio processing worker.
//!
//! This crate provides:
//! - The processing pipeline (metadata, channel gate, transcode, waveform, finalize)
//! - The dispatcher that enqueues tracks and falls back to the retry state
//! - The watchdog that re-enqueues tracks whose jobs were lost
//! - Timeline publication of newly ready tracks and albums
//! - The job executor with bounded concurrency and graceful shutdown

pub mod backoff;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod timeline;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{WatchdogSchedule, WorkerConfig};
pub use dispatcher::Dispatcher;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{Pipeline, ProcessOutcome};
pub use timeline::TimelineFanout;
pub use watchdog::{RunGuard, RunMarker, Watchdog, WatchdogReport};
