//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for track processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::TrackId;

/// Initialize tracing: JSON lines when `LOG_FORMAT=json`, colored text otherwise.
///
/// `RUST_LOG` directives are honored on top of `reel=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["reel=info", "sqlx=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Job logger for structured logging with consistent formatting.
///
/// Every event carries the track id and the operation name.
#[derive(Debug, Clone)]
pub struct JobLogger {
    track_id: TrackId,
    operation: String,
}

impl JobLogger {
    /// Create a new logger for a track and operation
    /// (e.g. "transcode_and_fetch_infos", "dispatch").
    pub fn new(track_id: TrackId, operation: &str) -> Self {
        Self {
            track_id,
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            track_id = %self.track_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            track_id = %self.track_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            track_id = %self.track_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            track_id = %self.track_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            track_id = %self.track_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            track_id = %self.track_id,
            operation = %self.operation
        )
    }
}
