//! Events emitted by the control loop.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::audio::{track::Track, volume::Volume};

/// Now-playing notification.
///
/// Emitted whenever the current track or the playing flag changes. A stopped
/// player is reported with no track and `is_playing == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUpdate {
    pub current_track: Option<Track>,
    pub is_playing: bool,
}

impl PlaybackUpdate {
    #[must_use]
    pub fn playing(track: Track) -> Self {
        Self {
            current_track: Some(track),
            is_playing: true,
        }
    }

    #[must_use]
    pub fn paused(track: Track) -> Self {
        Self {
            current_track: Some(track),
            is_playing: false,
        }
    }

    #[must_use]
    pub fn stopped() -> Self {
        Self {
            current_track: None,
            is_playing: false,
        }
    }
}

/// Transient human-readable notice such as "Enqueued: ..." or "Volume: 1.5".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage(pub String);

impl StatusMessage {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StatusMessage {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl Display for StatusMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Read-only view of the control loop state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    /// Queued tracks in order.
    pub tracks: Vec<Track>,
    /// Index of the current track (0 when the queue is empty).
    pub position: usize,
    /// Track of the live session, if any.
    pub now_playing: Option<Track>,
    /// Whether the live session is paused.
    pub paused: bool,
    /// Current volume level.
    pub volume: Volume,
}
