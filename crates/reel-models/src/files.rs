//! On-disk layout of a track's files.

use std::path::{Path, PathBuf};

/// Paths of every file derived from one stored upload.
///
/// Layout: `<storage>/tracks/<user-slug>/` holding the original `<hash><ext>`,
/// the transcode `<hash>.mp3`, and the waveform outputs `<hash><ext>.json`
/// and `<hash><ext>.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFiles {
    dir: PathBuf,
    filename: String,
}

impl TrackFiles {
    pub fn new(storage_root: impl AsRef<Path>, user_slug: &str, filename: &str) -> Self {
        Self {
            dir: storage_root.as_ref().join("tracks").join(user_slug),
            filename: filename.to_string(),
        }
    }

    /// Per-user directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn original(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    /// Sibling file with the source extension replaced by `.mp3`.
    pub fn transcoded(&self) -> PathBuf {
        self.original().with_extension("mp3")
    }

    pub fn waveform_json(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.filename))
    }

    pub fn waveform_png(&self) -> PathBuf {
        self.dir.join(format!("{}.png", self.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let files = TrackFiles::new("/srv/storage", "dashie", "abc123.ogg");

        assert_eq!(files.dir(), Path::new("/srv/storage/tracks/dashie"));
        assert_eq!(files.original(), Path::new("/srv/storage/tracks/dashie/abc123.ogg"));
        assert_eq!(files.transcoded(), Path::new("/srv/storage/tracks/dashie/abc123.mp3"));
        assert_eq!(
            files.waveform_json(),
            Path::new("/srv/storage/tracks/dashie/abc123.ogg.json")
        );
        assert_eq!(
            files.waveform_png(),
            Path::new("/srv/storage/tracks/dashie/abc123.ogg.png")
        );
    }

    #[test]
    fn test_transcoded_name_without_extension() {
        let files = TrackFiles::new("/data", "u", "abc123");
        assert_eq!(files.transcoded(), Path::new("/data/tracks/u/abc123.mp3"));
    }
}
