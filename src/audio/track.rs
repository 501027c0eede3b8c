//! Playable track model.

use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Audio container formats the player can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackFormat {
    Flac,
    Mp3,
    Wav,
    Ogg,
}

impl TrackFormat {
    /// Detects the format from a file extension, ignoring case.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "flac" => Some(Self::Flac),
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "ogg" => Some(Self::Ogg),
            _ => None,
        }
    }

    /// Detects the format from the extension of `path`.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(OsStr::to_str)
            .and_then(Self::from_extension)
    }

    /// Canonical lowercase file extension, used as a probe hint.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
        }
    }
}

impl Display for TrackFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Flac => "FLAC",
            Self::Mp3 => "MP3",
            Self::Wav => "WAV",
            Self::Ogg => "OGG",
        };
        f.write_str(name)
    }
}

/// A single playable audio file.
///
/// Tracks are immutable values whose identity is their path: two tracks
/// with the same path compare equal regardless of their tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    artist: String,
    album: String,
    title: String,
    path: PathBuf,
    format: Option<TrackFormat>,
}

impl Track {
    /// Creates a track, detecting its format from the path extension.
    ///
    /// A path without a recognised extension yields a track with no format;
    /// such a track is rejected by the decoder as unsupported.
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        title: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let format = TrackFormat::from_path(&path);
        Self {
            artist: artist.into(),
            album: album.into(),
            title: title.into(),
            path,
            format,
        }
    }

    /// Creates a track with unknown artist and album, titled after the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new("unknown", "unknown", title, path)
    }

    #[must_use]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    #[must_use]
    pub fn album(&self) -> &str {
        &self.album
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> Option<TrackFormat> {
        self.format
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} / {} / {}", self.artist, self.album, self.title)
    }
}
