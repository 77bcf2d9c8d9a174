//! External audio tool wrappers.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Tool invocation with a timeout and kill-on-timeout
//! - Audio probing (ffprobe), MP3 transcoding (ffmpeg), waveform rendering (audiowaveform)
//! - The `AudioTools` seam the worker pipeline is written against

pub mod command;
pub mod error;
pub mod probe;
pub mod tools;
pub mod transcode;
pub mod waveform;

pub use command::{check_tool, run_tool, FfmpegCommand, ToolOutput};
pub use error::{MediaError, MediaResult};
pub use probe::{parse_probe_output, probe_audio, AudioInfo};
pub use tools::{AudioTools, CliAudioTools, ToolConfig};
pub use transcode::transcode_to_mp3;
pub use waveform::{WaveformRenderer, WAVEFORM_UNAVAILABLE_MARKER};
