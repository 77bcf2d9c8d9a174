//! MP3 transcoding.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::command::{run_tool, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

/// Delivery codec settings.
pub const TARGET_CODEC: &str = "libmp3lame";
pub const TARGET_BITRATE: &str = "196k";
pub const TARGET_CHANNELS: u32 = 2;

/// Command that re-encodes `input` to the two-channel MP3 delivery format.
pub fn mp3_command(input: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .no_video()
        .audio_channels(TARGET_CHANNELS)
        .audio_codec(TARGET_CODEC)
        .audio_bitrate(TARGET_BITRATE)
}

/// Transcode `input` to MP3 at `output`.
pub async fn transcode_to_mp3(
    ffmpeg: &Path,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> MediaResult<()> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = mp3_command(input, output);
    run_tool(ffmpeg, cmd.build_args(), timeout).await?;

    info!(input = %input.display(), output = %output.display(), "Transcoded to MP3");
    Ok(())
}
