//! Playback queue state.
//!
//! The queue is plain data owned by the control loop. Its position always
//! points at the currently playing or most recently played track, never at
//! the next one to be played.

use rand::{Rng, seq::SliceRandom};

use crate::audio::track::Track;

/// Ordered list of tracks with a current position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    position: usize,
}

impl PlaybackQueue {
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Index of the current track. Always 0 for an empty queue.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The track at the current position, if the queue is non-empty.
    #[must_use]
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.position)
    }

    /// Appends a track and returns its index.
    pub fn push(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Appends all tracks in order.
    ///
    /// # Returns
    ///
    /// The index of the first appended track, or `None` if `tracks` was empty.
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> Option<usize> {
        let first = self.tracks.len();
        self.tracks.extend(tracks);
        (self.tracks.len() > first).then_some(first)
    }

    /// Replaces the whole queue with a single track at position 0.
    pub fn replace_with(&mut self, track: Track) {
        self.tracks.clear();
        self.tracks.push(track);
        self.position = 0;
    }

    /// Empties the queue and resets the position.
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.position = 0;
    }

    /// Moves the position to `index`.
    ///
    /// # Returns
    ///
    /// `false` (leaving the position untouched) if `index` is out of bounds.
    pub fn set_position(&mut self, index: usize) -> bool {
        if index < self.tracks.len() {
            self.position = index;
            true
        } else {
            false
        }
    }

    /// Moves to the next track if there is one.
    pub fn advance(&mut self) -> bool {
        self.set_position(self.position + 1)
    }

    /// Moves to the previous track if there is one.
    pub fn retreat(&mut self) -> bool {
        match self.position.checked_sub(1) {
            Some(index) => self.set_position(index),
            None => false,
        }
    }

    /// Shuffles the queue.
    ///
    /// With `keep_current` the current track and everything before it stay in
    /// place and only the upcoming tracks are shuffled. Otherwise the whole
    /// queue is shuffled and the position resets to 0.
    ///
    /// # Returns
    ///
    /// The number of tracks that took part in the shuffle.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R, keep_current: bool) -> usize {
        if keep_current {
            let start = (self.position + 1).min(self.tracks.len());
            let upcoming = &mut self.tracks[start..];
            upcoming.shuffle(rng);
            upcoming.len()
        } else {
            self.tracks.shuffle(rng);
            self.position = 0;
            self.tracks.len()
        }
    }
}
