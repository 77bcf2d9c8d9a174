//! Pipeline tests against the real ffmpeg, ffprobe and audiowaveform binaries.

use std::path::Path;
use std::sync::Arc;

use reel_media::{AudioTools, CliAudioTools, ToolConfig};
use reel_models::{ProcessingState, Track, TrackFiles};
use reel_store::{SqliteStore, TrackStore};
use reel_worker::{Pipeline, ProcessOutcome};

/// Write a sine tone with `channels` channels using ffmpeg's lavfi source.
async fn sine(path: &Path, channels: u32, codec: &str) {
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i", "sine=frequency=440:duration=2"])
        .args(["-ac", &channels.to_string(), "-c:a", codec])
        .arg(path)
        .status()
        .await
        .expect("Failed to run ffmpeg");
    assert!(status.success(), "ffmpeg could not generate {}", path.display());
}

async fn upload(store: &SqliteStore, root: &Path, channels: u32) -> (Track, TrackFiles) {
    let user_id = store.create_user("dashie").await.unwrap();
    let track = store
        .create_track(Track::new_upload(
            user_id,
            "Sine",
            "5e1e",
            "sine.ogg",
            ".ogg",
            "audio/ogg",
        ))
        .await
        .unwrap();

    let files = TrackFiles::new(root, "dashie", &track.filename);
    tokio::fs::create_dir_all(files.dir()).await.unwrap();
    sine(&files.original(), channels, "libvorbis").await;
    (track, files)
}

/// Test probing a generated file.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_probe_generated_tone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    sine(&path, 2, "pcm_s16le").await;

    let tools = CliAudioTools::new(ToolConfig::from_env());
    let info = tools.probe(&path).await.expect("Failed to probe");

    assert_eq!(info.channels, 2);
    assert!(info.sample_rate > 0);
    assert!((info.duration - 2.0).abs() < 0.1);
}

/// Test a full pipeline run on an OGG upload.
#[tokio::test]
#[ignore = "requires ffmpeg and audiowaveform"]
async fn test_pipeline_with_real_tools() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let (track, files) = upload(&store, dir.path(), 2).await;

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(CliAudioTools::new(ToolConfig::from_env())),
        dir.path(),
    );
    let outcome = pipeline.process(track.id).await.expect("Pipeline failed");

    assert_eq!(outcome, ProcessOutcome::Ready { waveform: true });
    assert!(files.transcoded().exists());
    assert!(files.waveform_json().exists());
    assert!(files.waveform_png().exists());

    let track = store.get_track(track.id).await.unwrap().unwrap();
    assert!(track.is_ready());
    assert_eq!(track.transcode_state, ProcessingState::Finished);
}

/// Test the channel gate on a surround file.
#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_pipeline_rejects_surround() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let (track, files) = upload(&store, dir.path(), 6).await;

    let pipeline = Pipeline::new(
        store.clone(),
        Arc::new(CliAudioTools::new(ToolConfig::from_env())),
        dir.path(),
    );
    let err = pipeline.process(track.id).await.unwrap_err();

    assert!(err.is_terminal());
    assert!(!files.transcoded().exists());
    let track = store.get_track(track.id).await.unwrap().unwrap();
    assert!(track.is_private());
    assert_eq!(track.transcode_state, ProcessingState::Failed);
}
