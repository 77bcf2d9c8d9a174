//! Backoff for the queue calls that settle a finished job.
//!
//! An ack or failure record lost to a dropped connection leaves the entry
//! pending until the stale-claim loop runs the track again, so these calls
//! are repeated while the error is transient.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use reel_models::TrackId;
use reel_queue::QueueResult;

/// Calls made before giving up.
const ATTEMPTS: u32 = 4;
const FIRST_PAUSE: Duration = Duration::from_millis(100);
const MAX_PAUSE: Duration = Duration::from_secs(2);

/// Pause after the `attempt`-th failed call (1-based).
fn pause_after(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    FIRST_PAUSE.saturating_mul(factor).min(MAX_PAUSE)
}

/// Run a bookkeeping call for `track_id`, repeating it on transient errors.
pub async fn settle<T, F, Fut>(call_name: &'static str, track_id: TrackId, mut call: F) -> QueueResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = QueueResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < ATTEMPTS => {
                let pause = pause_after(attempt);
                debug!(
                    track_id = %track_id,
                    call = call_name,
                    attempt,
                    "Queue call failed, retrying in {:?}: {}", pause, e
                );
                tokio::time::sleep(pause).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Log limiter for the consume loop: the first `loud` errors of a streak
/// are logged, then one warning, then nothing until the queue answers again.
#[derive(Debug)]
pub struct ErrorStreak {
    length: u32,
    loud: u32,
}

impl ErrorStreak {
    pub fn new(loud: u32) -> Self {
        Self { length: 0, loud }
    }

    /// Count an error. Returns whether it should be logged.
    pub fn failed(&mut self) -> bool {
        self.length += 1;
        if self.length == self.loud + 1 {
            warn!(
                "{} consecutive consume errors, muting until the queue recovers",
                self.loud
            );
        }
        self.length <= self.loud
    }

    pub fn recovered(&mut self) {
        if self.length > self.loud {
            info!("Queue recovered after {} consecutive errors", self.length);
        }
        self.length = 0;
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}
