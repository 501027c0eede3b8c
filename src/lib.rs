//! Chime - terminal music player.
//!
//! A local audio playback engine: a track queue and a single control loop
//! that serializes user commands against the playing stream, reporting
//! now-playing changes and status messages over channels.

pub mod audio;
pub mod config;
pub mod error;
pub mod library;

// Re-export key types for convenience
pub use {
    audio::{
        events::{PlaybackUpdate, QueueSnapshot, StatusMessage},
        player::Player,
        track::{Track, TrackFormat},
        volume::Volume,
    },
    config::{SettingsManager, UserSettings},
    error::{LibraryError, PlaybackError, PlayerError},
    library::scan_library,
};
