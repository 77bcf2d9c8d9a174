//! Fakes shared by the worker unit tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use reel_media::{AudioInfo, AudioTools, MediaError, MediaResult};
use reel_models::{Album, Track, TrackFiles, TriState, Waveform};
use reel_queue::{JobBroker, QueueConnector, QueueError, QueueJob, QueueResult};
use reel_store::{MemoryStore, TrackStore};

pub const USER_ID: i64 = 1;
pub const USER_SLUG: &str = "dashie";

/// Broker that records submissions in memory.
#[derive(Default)]
pub struct FakeBroker {
    pub submitted: Mutex<Vec<QueueJob>>,
    pub pending: Mutex<Vec<QueueJob>>,
    pub fail_submit: bool,
}

impl FakeBroker {
    pub fn with_pending(pending: Vec<QueueJob>) -> Self {
        Self {
            pending: Mutex::new(pending),
            ..Default::default()
        }
    }

    pub fn submitted_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|j| j.track_id().get())
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl JobBroker for FakeBroker {
    async fn submit(&self, job: &QueueJob) -> QueueResult<String> {
        if self.fail_submit {
            return Err(QueueError::submit_failed("broker rejected job"));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(*job);
        Ok(format!("0-{}", submitted.len()))
    }

    async fn pending_jobs(&self) -> QueueResult<Vec<QueueJob>> {
        Ok(self.pending.lock().unwrap().clone())
    }
}

/// Connector handing out one shared [`FakeBroker`], or failing when it has none.
#[derive(Default)]
pub struct FakeConnector {
    pub broker: Option<Arc<FakeBroker>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(broker: Arc<FakeBroker>) -> Self {
        Self {
            broker: Some(broker),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueConnector for FakeConnector {
    async fn connect(&self) -> QueueResult<Arc<dyn JobBroker>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.broker {
            Some(broker) => Ok(broker.clone() as Arc<dyn JobBroker>),
            None => Err(QueueError::connection_failed("connection refused")),
        }
    }
}

/// Tool double: reports a fixed probe result and writes placeholder output files.
pub struct FakeTools {
    pub channels: u32,
    pub fail_probe: bool,
    pub waveform_unavailable: bool,
    pub calls: Mutex<Vec<&'static str>>,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            channels: 2,
            fail_probe: false,
            waveform_unavailable: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTools {
    pub fn with_channels(channels: u32) -> Self {
        Self {
            channels,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

fn sample_waveform() -> Waveform {
    Waveform {
        version: 2,
        channels: 1,
        sample_rate: 44100,
        samples_per_pixel: 4410,
        bits: 8,
        length: 2,
        data: vec![-12, 14, -3, 5],
    }
}

#[async_trait]
impl AudioTools for FakeTools {
    async fn probe(&self, path: &Path) -> MediaResult<AudioInfo> {
        self.calls.lock().unwrap().push("probe");
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        if self.fail_probe {
            return Err(MediaError::invalid_audio("No audio stream found"));
        }
        Ok(AudioInfo {
            duration: 187.5,
            sample_rate: 44100,
            channels: self.channels,
            bitrate: 160,
            codec: Some("vorbis".to_string()),
        })
    }

    async fn transcode(&self, _input: &Path, output: &Path) -> MediaResult<()> {
        self.calls.lock().unwrap().push("transcode");
        tokio::fs::write(output, b"ID3").await?;
        Ok(())
    }

    async fn render_waveform(
        &self,
        _input: &Path,
        json_out: &Path,
        png_out: &Path,
    ) -> MediaResult<Waveform> {
        self.calls.lock().unwrap().push("waveform");
        if self.waveform_unavailable {
            return Err(MediaError::WaveformUnavailable(
                "JSON: Can't generate waveform".to_string(),
            ));
        }
        tokio::fs::write(json_out, b"{}").await?;
        tokio::fs::write(png_out, b"PNG").await?;
        Ok(sample_waveform())
    }
}

/// Temporary storage root plus a store holding one user.
pub async fn setup() -> (TempDir, Arc<MemoryStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.add_user(USER_ID, USER_SLUG).await;
    (dir, store)
}

pub async fn add_album(store: &MemoryStore, id: i64, private: bool) {
    store
        .add_album(Album {
            id,
            user_id: USER_ID,
            title: format!("Album {}", id),
            private: TriState::from(private),
        })
        .await;
}

/// Create a track row and write its original file under the storage root.
pub async fn upload(store: &MemoryStore, root: &Path, track: Track) -> Track {
    let track = store.create_track(track).await.unwrap();
    let files = TrackFiles::new(root, USER_SLUG, &track.filename);
    tokio::fs::create_dir_all(files.dir()).await.unwrap();
    tokio::fs::write(files.original(), b"OggS").await.unwrap();
    track
}

pub fn ogg_track(hash: &str) -> Track {
    Track::new_upload(USER_ID, "Tidal", hash, "tidal.ogg", ".ogg", "audio/ogg")
}

pub fn mp3_track(hash: &str) -> Track {
    Track::new_upload(USER_ID, "Coda", hash, "coda.mp3", ".mp3", "audio/mpeg")
}

pub fn files_for(root: &Path, track: &Track) -> TrackFiles {
    TrackFiles::new(root, USER_SLUG, &track.filename)
}
