//! Redis/Queue integration tests.

use std::sync::Arc;

use reel_models::{ProcessingState, Track, TrackId};
use reel_queue::{JobQueue, QueueConfig, QueueJob, RedisConnector};
use reel_store::{SqliteStore, TrackStore};
use reel_worker::{Dispatcher, Watchdog};

/// Config from the environment with streams private to one test.
fn isolated_config() -> QueueConfig {
    dotenvy::dotenv().ok();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    QueueConfig {
        stream_name: format!("reel:test:{}", suffix),
        consumer_group: format!("reel:test-workers:{}", suffix),
        failed_stream_name: format!("reel:test-failed:{}", suffix),
        ..QueueConfig::from_env()
    }
}

async fn store_with_tracks(count: usize) -> (Arc<SqliteStore>, Vec<TrackId>) {
    let store = Arc::new(SqliteStore::in_memory().await.expect("Failed to open store"));
    let user_id = store.create_user("dashie").await.expect("Failed to create user");

    let mut ids = Vec::new();
    for i in 0..count {
        let track = Track::new_upload(
            user_id,
            format!("Track {}", i),
            format!("hash{}", i),
            "song.ogg",
            ".ogg",
            "audio/ogg",
        );
        ids.push(store.create_track(track).await.expect("Failed to create track").id);
    }
    (store, ids)
}

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    let queue = JobQueue::connect(isolated_config())
        .await
        .expect("Failed to connect queue");

    assert_eq!(queue.len().await.expect("Failed to get queue length"), 0);
    assert_eq!(queue.failed_len().await.expect("Failed to get failed length"), 0);
}

/// Test submit, pending list, consume and ack.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_submit_consume_ack() {
    let queue = JobQueue::connect(isolated_config())
        .await
        .expect("Failed to connect queue");

    let job = QueueJob::transcode_and_fetch_infos(TrackId(42));
    queue.submit(&job).await.expect("Failed to submit");

    let pending = queue.pending_jobs().await.expect("Failed to list pending");
    assert_eq!(pending, vec![job]);

    let jobs = queue
        .consume("test-consumer", 1000, 1)
        .await
        .expect("Failed to consume");
    assert_eq!(jobs.len(), 1);
    let (message_id, consumed) = &jobs[0];
    assert_eq!(consumed.track_id(), TrackId(42));

    // Delivered but unacknowledged jobs still count as pending
    assert_eq!(queue.pending_jobs().await.unwrap().len(), 1);

    queue.ack(message_id).await.expect("Failed to ack");
    assert!(queue.pending_jobs().await.unwrap().is_empty());
}

/// Test that failed jobs are recorded and leave the pending list.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_record_failure() {
    let queue = JobQueue::connect(isolated_config())
        .await
        .expect("Failed to connect queue");

    let job = QueueJob::transcode_and_fetch_infos(TrackId(7));
    queue.submit(&job).await.expect("Failed to submit");
    let jobs = queue.consume("test-consumer", 1000, 1).await.unwrap();
    let (message_id, job) = &jobs[0];

    queue
        .record_failure(message_id, job, "transcode failed")
        .await
        .expect("Failed to record failure");

    assert_eq!(queue.failed_len().await.unwrap(), 1);
    assert!(queue.pending_jobs().await.unwrap().is_empty());
}

/// Test that the dispatcher submits through a fresh connection.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_dispatcher_enqueue() {
    let config = isolated_config();
    let (store, ids) = store_with_tracks(1).await;
    let dispatcher = Dispatcher::new(Arc::new(RedisConnector::new(config.clone())), store.clone());

    dispatcher.enqueue(ids[0]).await.expect("Failed to enqueue");

    let queue = JobQueue::connect(config).await.unwrap();
    let pending = queue.pending_jobs().await.unwrap();
    assert_eq!(pending, vec![QueueJob::transcode_and_fetch_infos(ids[0])]);

    let track = store.get_track(ids[0]).await.unwrap().unwrap();
    assert_eq!(track.metadatas_state, ProcessingState::Waiting);
}

/// Test that the watchdog only re-submits tracks missing from the stream.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_watchdog_requeues_lost_tracks() {
    let config = isolated_config();
    let (store, ids) = store_with_tracks(3).await;
    let queue = JobQueue::connect(config.clone()).await.unwrap();
    queue
        .submit(&QueueJob::transcode_and_fetch_infos(ids[0]))
        .await
        .unwrap();

    let watchdog = Watchdog::new(Arc::new(RedisConnector::new(config)), store);
    let report = watchdog.run_once().await;

    assert_eq!(report.pending, 1);
    assert_eq!(report.requeued, 2);

    let mut pending: Vec<i64> = queue
        .pending_jobs()
        .await
        .unwrap()
        .iter()
        .map(|j| j.track_id().get())
        .collect();
    pending.sort_unstable();
    let mut expected: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    expected.sort_unstable();
    assert_eq!(pending, expected);
}

/// Test the retry fallback when nothing listens on the broker port.
#[tokio::test]
async fn test_dispatcher_fallback_without_broker() {
    let config = QueueConfig {
        redis_url: reel_queue::redis_url("127.0.0.1", 1, 0),
        ..QueueConfig::default()
    };
    let (store, ids) = store_with_tracks(1).await;
    let dispatcher = Dispatcher::new(Arc::new(RedisConnector::new(config)), store.clone());

    assert!(dispatcher.enqueue(ids[0]).await.is_err());

    let track = store.get_track(ids[0]).await.unwrap().unwrap();
    assert_eq!(track.transcode_state, ProcessingState::Retrying);
    assert_eq!(track.metadatas_state, ProcessingState::Retrying);
    assert!(!track.is_ready());
}
