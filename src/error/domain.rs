//! Domain-specific error types using `thiserror`.
//!
//! This module defines the main error enums for the different domains of
//! the player: playback (decode and output), the player facade, and the
//! on-disk library.

use std::{io::Error as StdError, path::PathBuf};

use thiserror::Error;

use crate::audio::{decoder::DecoderError, output::OutputError};

/// Playback errors raised while opening or starting a track.
///
/// Every variant is recoverable: the control loop reports it as a status
/// message and returns to idle.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The file extension or codec is not one the player can decode.
    #[error("Unsupported format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    /// The file could not be read or is malformed.
    #[error("Decode failure: {0}")]
    DecodeFailure(#[from] DecoderError),
    /// The output device could not be initialised or started.
    #[error("Device failure: {0}")]
    DeviceFailure(#[from] OutputError),
}

/// Errors returned by the player facade.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// The command channel has been released.
    #[error("Player is closed")]
    Closed,
    /// The control loop runtime could not be built.
    #[error("Runtime error: {0}")]
    RuntimeError(StdError),
    /// The control loop thread could not be spawned.
    #[error("Failed to spawn control loop: {0}")]
    SpawnError(StdError),
}

/// Library-related errors.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// The library root could not be read.
    #[error("Failed to read library directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: StdError,
    },
    /// The library root is not a directory.
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Error, ErrorKind::PermissionDenied},
        path::PathBuf,
    };

    use crate::{
        audio::{decoder::DecoderError, output::OutputError},
        error::domain::{LibraryError, PlaybackError, PlayerError},
    };

    #[test]
    fn test_playback_error_display() {
        let unsupported = PlaybackError::UnsupportedFormat {
            path: PathBuf::from("/music/a/b/notes.txt"),
        };
        assert_eq!(
            unsupported.to_string(),
            "Unsupported format: /music/a/b/notes.txt"
        );

        let decode = PlaybackError::from(DecoderError::NoAudioTrack);
        assert_eq!(decode.to_string(), "Decode failure: No audio track found");

        let device = PlaybackError::from(OutputError::NoDeviceFound);
        assert_eq!(
            device.to_string(),
            "Device failure: No suitable audio device found"
        );
    }

    #[test]
    fn test_player_error_display() {
        assert_eq!(PlayerError::Closed.to_string(), "Player is closed");
    }

    #[test]
    fn test_library_error_display() {
        let error = LibraryError::Unreadable {
            path: PathBuf::from("/music"),
            source: Error::new(PermissionDenied, "denied"),
        };
        assert_eq!(
            error.to_string(),
            "Failed to read library directory /music: denied"
        );

        let error = LibraryError::NotADirectory {
            path: PathBuf::from("/music/song.flac"),
        };
        assert_eq!(error.to_string(), "Not a directory: /music/song.flac");
    }
}
