//! Watchdog reconciliation.
//!
//! Periodically compares tracks that are not ready with the broker's pending
//! jobs and re-submits every track whose job was lost.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use reel_queue::{QueueConnector, QueueJob};
use reel_store::TrackStore;

use crate::config::WatchdogSchedule;
use crate::metrics;

/// Mutual exclusion flag for watchdog runs, owned by the watchdog.
#[derive(Debug, Default)]
pub struct RunMarker {
    running: AtomicBool,
}

impl RunMarker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the marker, or return `None` if a run already holds it.
    pub fn try_start(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { marker: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the marker when dropped.
#[derive(Debug)]
pub struct RunGuard<'a> {
    marker: &'a RunMarker,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.marker.running.store(false, Ordering::Release);
    }
}

/// Counts from one watchdog run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    /// Another run held the marker; nothing was done.
    pub skipped: bool,
    pub not_ready: usize,
    pub pending: usize,
    pub requeued: usize,
    pub failed: usize,
}

pub struct Watchdog {
    connector: Arc<dyn QueueConnector>,
    store: Arc<dyn TrackStore>,
    marker: RunMarker,
}

impl Watchdog {
    pub fn new(connector: Arc<dyn QueueConnector>, store: Arc<dyn TrackStore>) -> Self {
        Self {
            connector,
            store,
            marker: RunMarker::new(),
        }
    }

    pub fn marker(&self) -> &RunMarker {
        &self.marker
    }

    /// One reconciliation pass. Never fails: every error is logged and the
    /// rest of the pass continues or stops early.
    pub async fn run_once(&self) -> WatchdogReport {
        let Some(_guard) = self.marker.try_start() else {
            debug!("Watchdog already running, skipping");
            metrics::record_watchdog_run("skipped");
            return WatchdogReport {
                skipped: true,
                ..Default::default()
            };
        };

        let mut report = WatchdogReport::default();

        let broker = match self.connector.connect().await {
            Ok(broker) => broker,
            Err(e) => {
                warn!(error = %e, "Watchdog cannot reach the broker");
                metrics::record_watchdog_run("aborted");
                return report;
            }
        };

        let pending = match broker.pending_jobs().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Watchdog cannot list pending jobs");
                metrics::record_watchdog_run("aborted");
                return report;
            }
        };
        report.pending = pending.len();

        let tracks = match self.store.not_ready_tracks().await {
            Ok(tracks) => tracks,
            Err(e) => {
                error!(error = %e, "Watchdog cannot load tracks");
                metrics::record_watchdog_run("aborted");
                return report;
            }
        };

        let candidates: Vec<_> = tracks
            .into_iter()
            .filter(|t| !t.is_terminally_failed())
            .collect();
        report.not_ready = candidates.len();

        if candidates.is_empty() {
            metrics::record_watchdog_run("completed");
            return report;
        }

        let queued: HashSet<i64> = pending.iter().map(|j| j.track_id().get()).collect();
        if queued.is_empty() {
            info!(tracks = candidates.len(), "No pending jobs, re-enqueueing every not-ready track");
        }

        for track in candidates.iter().filter(|t| !queued.contains(&t.id.get())) {
            match broker.submit(&QueueJob::transcode_and_fetch_infos(track.id)).await {
                Ok(message_id) => {
                    info!(track_id = %track.id, message_id = %message_id, "Watchdog re-enqueued track");
                    report.requeued += 1;
                }
                Err(e) => {
                    warn!(track_id = %track.id, error = %e, "Watchdog failed to re-enqueue track");
                    report.failed += 1;
                }
            }
        }

        metrics::record_requeue(report.requeued as u64);
        metrics::record_watchdog_run("completed");
        info!(
            not_ready = report.not_ready,
            pending = report.pending,
            requeued = report.requeued,
            failed = report.failed,
            "Watchdog run finished"
        );
        report
    }

    /// Run on `schedule` until shutdown. Each run is spawned, so a slow run
    /// makes the next tick a no-op through the marker.
    pub async fn run_schedule(
        self: Arc<Self>,
        schedule: WatchdogSchedule,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval_at(Instant::now() + schedule.initial_delay, schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Watchdog schedule stopped");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let watchdog = Arc::clone(&self);
                    tokio::spawn(async move {
                        watchdog.run_once().await;
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ogg_track, setup, FakeBroker, FakeConnector};
    use reel_models::{TrackId, TriState, CHANNEL_LIMIT_ERROR};
    use reel_store::MemoryStore;
    use std::time::Duration;

    async fn three_tracks(store: &MemoryStore) -> Vec<TrackId> {
        let mut ids = Vec::new();
        for hash in ["w1", "w2", "w3"] {
            ids.push(store.create_track(ogg_track(hash)).await.unwrap().id);
        }
        ids
    }

    #[tokio::test]
    async fn test_empty_queue_requeues_all() {
        let (_dir, store) = setup().await;
        let ids = three_tracks(&store).await;
        let broker = Arc::new(FakeBroker::default());
        let watchdog = Watchdog::new(Arc::new(FakeConnector::new(broker.clone())), store.clone());

        let report = watchdog.run_once().await;

        assert_eq!(report.requeued, 3);
        let expected: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        assert_eq!(broker.submitted_ids(), expected);
        assert!(!watchdog.marker().is_running());
    }

    #[tokio::test]
    async fn test_partial_queue_requeues_missing() {
        let (_dir, store) = setup().await;
        let ids = three_tracks(&store).await;
        let broker = Arc::new(FakeBroker::with_pending(vec![
            QueueJob::transcode_and_fetch_infos(ids[1]),
        ]));
        let watchdog = Watchdog::new(Arc::new(FakeConnector::new(broker.clone())), store.clone());

        let report = watchdog.run_once().await;

        assert_eq!(report.pending, 1);
        assert_eq!(report.requeued, 2);
        assert_eq!(broker.submitted_ids(), vec![ids[0].get(), ids[2].get()]);
    }

    #[tokio::test]
    async fn test_pending_job_from_loose_payload_matches() {
        let (_dir, store) = setup().await;
        let ids = three_tracks(&store).await;
        let loose: QueueJob = serde_json::from_str(&format!(
            r#"{{"task":"transcode_and_fetch_infos","track_id":"{}"}}"#,
            ids[0]
        ))
        .unwrap();
        let broker = Arc::new(FakeBroker::with_pending(vec![loose]));
        let watchdog = Watchdog::new(Arc::new(FakeConnector::new(broker.clone())), store.clone());

        watchdog.run_once().await;

        assert_eq!(broker.submitted_ids(), vec![ids[1].get(), ids[2].get()]);
    }

    #[tokio::test]
    async fn test_marker_held_skips_run() {
        let (_dir, store) = setup().await;
        three_tracks(&store).await;
        let connector = Arc::new(FakeConnector::new(Arc::new(FakeBroker::default())));
        let watchdog = Watchdog::new(connector.clone(), store.clone());

        let guard = watchdog.marker().try_start().unwrap();
        let report = watchdog.run_once().await;
        drop(guard);

        assert!(report.skipped);
        assert_eq!(connector.connect_count(), 0);

        let report = watchdog.run_once().await;
        assert!(!report.skipped);
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_tracks_are_not_requeued() {
        let (_dir, store) = setup().await;
        let ids = three_tracks(&store).await;
        let mut rejected = store.get_track(ids[0]).await.unwrap().unwrap();
        rejected.reject(CHANNEL_LIMIT_ERROR);
        store.update_track(&rejected).await.unwrap();
        let mut ready = store.get_track(ids[1]).await.unwrap().unwrap();
        ready.ready = TriState::Yes;
        store.update_track(&ready).await.unwrap();

        let broker = Arc::new(FakeBroker::default());
        let watchdog = Watchdog::new(Arc::new(FakeConnector::new(broker.clone())), store.clone());
        let report = watchdog.run_once().await;

        assert_eq!(report.not_ready, 1);
        assert_eq!(broker.submitted_ids(), vec![ids[2].get()]);
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_logged_not_fatal() {
        let (_dir, store) = setup().await;
        three_tracks(&store).await;
        let watchdog = Watchdog::new(Arc::new(FakeConnector::unreachable()), store.clone());

        let report = watchdog.run_once().await;

        assert_eq!(report.requeued, 0);
        assert!(!report.skipped);
        assert!(!watchdog.marker().is_running());
    }

    #[tokio::test]
    async fn test_submit_failures_are_counted() {
        let (_dir, store) = setup().await;
        three_tracks(&store).await;
        let broker = Arc::new(FakeBroker {
            fail_submit: true,
            ..Default::default()
        });
        let watchdog = Watchdog::new(Arc::new(FakeConnector::new(broker)), store.clone());

        let report = watchdog.run_once().await;

        assert_eq!(report.failed, 3);
        assert_eq!(report.requeued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_waits_for_initial_delay() {
        let (_dir, store) = setup().await;
        three_tracks(&store).await;
        let broker = Arc::new(FakeBroker::default());
        let connector = Arc::new(FakeConnector::new(broker.clone()));
        let watchdog = Arc::new(Watchdog::new(connector.clone(), store.clone()));
        let (tx, rx) = watch::channel(false);

        let schedule = WatchdogSchedule {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(300),
        };
        let handle = tokio::spawn(watchdog.clone().run_schedule(schedule, rx));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.connect_count(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(connector.connect_count(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
