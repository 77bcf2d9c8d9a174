//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::ToolConfig;

/// When the watchdog runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSchedule {
    /// Delay before the first run after start
    pub initial_delay: Duration,
    /// Period between runs
    pub interval: Duration,
}

impl Default for WatchdogSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(300),
        }
    }
}

/// Slack added to the longest possible job before its entry counts as abandoned.
pub const CLAIM_MARGIN: Duration = Duration::from_secs(300);

/// Idle time after which a delivered job may be claimed. Redis only resets
/// the idle clock on delivery, so a live job must never reach it.
pub fn claim_min_idle(tools: &ToolConfig, requested: Option<Duration>) -> Duration {
    let floor = tools.max_job_duration() + CLAIM_MARGIN;
    requested.map_or(floor, |requested| requested.max(floor))
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the upload storage (`<root>/tracks/<user-slug>/...`)
    pub storage_path: PathBuf,
    /// sqlx connection URL of the track database
    pub database_url: String,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// How long a consume call blocks waiting for new jobs
    pub consume_block: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for jobs held by dead consumers
    pub claim_interval: Duration,
    /// Minimum idle time before a delivered job can be claimed (crash recovery).
    /// Never below [`ToolConfig::max_job_duration`] plus [`CLAIM_MARGIN`].
    pub claim_min_idle: Duration,
    pub watchdog: WatchdogSchedule,
    pub tools: ToolConfig,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let tools = ToolConfig::default();
        Self {
            storage_path: PathBuf::from("uploads"),
            database_url: "sqlite://reel2bits.db?mode=rwc".to_string(),
            max_concurrent_jobs: 2,
            consume_block: Duration::from_millis(1000),
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: claim_min_idle(&tools, None),
            watchdog: WatchdogSchedule::default(),
            tools,
            metrics_port: None,
        }
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let tools = ToolConfig::from_env();
        let requested_idle = std::env::var("WORKER_CLAIM_MIN_IDLE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        Self {
            storage_path: std::env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://reel2bits.db?mode=rwc".to_string()),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            consume_block: Duration::from_millis(
                std::env::var("WORKER_CONSUME_BLOCK_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", 30),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", 30),
            claim_min_idle: claim_min_idle(&tools, requested_idle),
            watchdog: WatchdogSchedule {
                initial_delay: env_secs("WATCHDOG_INITIAL_DELAY_SECS", 60),
                interval: env_secs("WATCHDOG_INTERVAL_SECS", 300),
            },
            tools,
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}
