//! Shared data models for the reel2bits processing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Tracks and their processing state
//! - Derived technical metadata and waveform envelopes
//! - Albums and public timeline entries
//! - The per-user storage layout of track files

pub mod files;
pub mod state;
pub mod timeline;
pub mod track;
pub mod track_info;

// Re-export common types
pub use files::TrackFiles;
pub use state::{InvalidStateCode, ProcessingState, TriState};
pub use timeline::{Album, TimelineItem};
pub use track::{Track, TrackId, CANONICAL_MIMETYPE, CHANNEL_LIMIT_ERROR};
pub use track_info::{codec_for_mime, CodecLabel, TrackInfo, Waveform};
