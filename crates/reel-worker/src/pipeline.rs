//! The per-track processing pipeline.
//!
//! Stages run in strict order: preflight, metadata, channel gate, transcode,
//! waveform, finalize. All state is reloaded from the store, so a job can be
//! delivered more than once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn, Instrument};

use reel_media::AudioTools;
use reel_models::{
    ProcessingState, Track, TrackFiles, TrackId, TrackInfo, TriState, CANONICAL_MIMETYPE,
    CHANNEL_LIMIT_ERROR,
};
use reel_queue::TASK_NAME;
use reel_store::TrackStore;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::timeline::TimelineFanout;

/// Highest channel count the pipeline accepts.
pub const MAX_CHANNELS: u32 = 2;

/// How a successful `process` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The track row no longer exists.
    Missing,
    /// A previous run already finished the track.
    AlreadyReady,
    /// The track was rejected earlier and stays parked.
    TerminallyFailed,
    /// The track is now ready. `waveform` is false when rendering failed.
    Ready { waveform: bool },
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Missing => "missing",
            ProcessOutcome::AlreadyReady => "already_ready",
            ProcessOutcome::TerminallyFailed => "terminally_failed",
            ProcessOutcome::Ready { waveform: true } => "ready",
            ProcessOutcome::Ready { waveform: false } => "ready_without_waveform",
        }
    }
}

/// Runs the stages for one track.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn TrackStore>,
    tools: Arc<dyn AudioTools>,
    timeline: TimelineFanout,
    storage_root: PathBuf,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn TrackStore>,
        tools: Arc<dyn AudioTools>,
        storage_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            timeline: TimelineFanout::new(store.clone()),
            store,
            tools,
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Process one track end to end.
    ///
    /// Returns an error when a stage fails. A rejected track yields
    /// [`WorkerError::TrackRejected`] after its terminal state is persisted.
    pub async fn process(&self, track_id: TrackId) -> WorkerResult<ProcessOutcome> {
        let logger = JobLogger::new(track_id, TASK_NAME);
        let span = logger.create_span();
        self.run(track_id, &logger).instrument(span).await
    }

    async fn run(&self, track_id: TrackId, logger: &JobLogger) -> WorkerResult<ProcessOutcome> {
        // Preflight
        let Some(track) = self.store.get_track(track_id).await? else {
            logger.log_warning("track not found, assuming it was deleted");
            return Ok(ProcessOutcome::Missing);
        };
        if track.is_ready() {
            debug!(track_id = %track_id, "Track already ready");
            return Ok(ProcessOutcome::AlreadyReady);
        }
        if track.is_terminally_failed() {
            debug!(track_id = %track_id, "Track terminally failed, not reprocessing");
            return Ok(ProcessOutcome::TerminallyFailed);
        }

        let slug = self
            .store
            .user_slug(track.user_id)
            .await?
            .ok_or(WorkerError::UserNotFound(track.user_id))?;
        let files = TrackFiles::new(&self.storage_root, &slug, &track.filename);

        logger.log_start(&format!("processing {}", files.original().display()));

        let (track, mut info) = self.fetch_infos(track, &files, logger).await?;

        if info.channels > MAX_CHANNELS {
            return self.reject(track, info.channels, logger).await;
        }

        let track = self.transcode(track, &files, logger).await?;

        let source = waveform_source(&track, &files);
        match self
            .tools
            .render_waveform(&source, &files.waveform_json(), &files.waveform_png())
            .await
        {
            Ok(waveform) => {
                logger.log_progress(&format!("waveform rendered from {}", source.display()));
                info.set_waveform(waveform);
            }
            Err(e) => {
                logger.log_warning(&format!(
                    "waveform unavailable for {}: {}",
                    source.display(),
                    e
                ));
                info.set_waveform_error(e.to_string());
            }
        }

        self.finalize(track, info, logger).await
    }

    /// Probe the original file and persist the TrackInfo linked to the track.
    async fn fetch_infos(
        &self,
        mut track: Track,
        files: &TrackFiles,
        logger: &JobLogger,
    ) -> WorkerResult<(Track, TrackInfo)> {
        track.metadatas_state = ProcessingState::Started;
        let track = self.store.update_track(&track).await?;
        let started = Utc::now();

        let audio = match self.tools.probe(&files.original()).await {
            Ok(audio) => audio,
            Err(e) => {
                logger.log_error(&format!(
                    "cannot read {}: {}",
                    files.original().display(),
                    e
                ));
                if let Err(store_err) = self
                    .store
                    .set_processing_states(track.id, None, Some(ProcessingState::Failed))
                    .await
                {
                    warn!(track_id = %track.id, "Failed to record metadata failure: {}", store_err);
                }
                return Err(e.into());
            }
        };

        let existing = match track.track_info_id {
            Some(id) => self.store.get_track_info(id).await?,
            None => None,
        };
        let reused = existing.is_some();
        let mut info = existing.unwrap_or_else(|| TrackInfo::new(track.id, &track.hash));

        info.duration = audio.duration;
        info.rate = audio.sample_rate;
        info.channels = audio.channels;
        info.bitrate = audio.bitrate;
        info.codec = audio.codec;
        info.apply_codec_label(&track.mimetype);
        info.processed_basic = ProcessingState::Finished;
        info.processing_start = Some(started);
        info.processing_stop = None;

        let info = if reused {
            self.store.update_track_info(&info).await?;
            info
        } else {
            self.store.create_track_info(info).await?
        };

        let mut track = track;
        track.track_info_id = Some(info.id);
        track.metadatas_state = ProcessingState::Finished;
        let track = self.store.update_track(&track).await?;

        logger.log_progress(&format!(
            "metadata: {:.1}s, {} Hz, {} channel(s), {} kbit/s",
            info.duration, info.rate, info.channels, info.bitrate
        ));
        Ok((track, info))
    }

    async fn reject(
        &self,
        mut track: Track,
        channels: u32,
        logger: &JobLogger,
    ) -> WorkerResult<ProcessOutcome> {
        logger.log_error(&format!("{} channels: {}", channels, CHANNEL_LIMIT_ERROR));
        track.reject(CHANNEL_LIMIT_ERROR);
        let track = self.store.update_track(&track).await?;
        Err(WorkerError::rejected(track.id, CHANNEL_LIMIT_ERROR))
    }

    async fn transcode(
        &self,
        mut track: Track,
        files: &TrackFiles,
        logger: &JobLogger,
    ) -> WorkerResult<Track> {
        if !track.needs_transcode() {
            if track.transcode_state != ProcessingState::NotNeeded {
                track.transcode_state = ProcessingState::Finished;
                return Ok(self.store.update_track(&track).await?);
            }
            return Ok(track);
        }

        track.transcode_state = ProcessingState::Started;
        track.transcode_start = Some(Utc::now());
        track.transcode_stop = None;
        let mut track = self.store.update_track(&track).await?;

        let output = files.transcoded();
        if let Err(e) = self.tools.transcode(&files.original(), &output).await {
            logger.log_error(&format!(
                "transcode of {} failed: {}",
                files.original().display(),
                e
            ));
            return Err(e.into());
        }

        track.transcode_stop = Some(Utc::now());
        track.transcode_needed = TriState::No;
        track.transcode_state = ProcessingState::Finished;
        let track = self.store.update_track(&track).await?;

        logger.log_progress(&format!("transcoded to {}", output.display()));
        Ok(track)
    }

    async fn finalize(
        &self,
        mut track: Track,
        mut info: TrackInfo,
        logger: &JobLogger,
    ) -> WorkerResult<ProcessOutcome> {
        info.processing_stop = Some(Utc::now());
        self.store.update_track_info(&info).await?;

        track.ready = TriState::Yes;
        debug_assert!(track.readiness_invariant_holds());
        let track = self.store.update_track(&track).await?;

        if !track.is_private() {
            self.timeline.publish(&track).await?;
        }

        let waveform = info.waveform.is_some();
        logger.log_completion(if waveform {
            "track ready"
        } else {
            "track ready without waveform"
        });
        Ok(ProcessOutcome::Ready { waveform })
    }
}

/// The transcoded file when one exists, else the original.
fn waveform_source(track: &Track, files: &TrackFiles) -> PathBuf {
    let transcoded = files.transcoded();
    if track.mimetype != CANONICAL_MIMETYPE && transcoded.exists() {
        transcoded
    } else {
        files.original()
    }
}
