//! Decoder and output capabilities consumed by the control loop.
//!
//! The control loop never touches codecs or devices directly. It opens a
//! [`SampleSource`] through a [`TrackDecoder`] and hands it to an
//! [`OutputDevice`], which reports the end of playback through a
//! [`CompletionNotifier`].

use std::time::Duration;

use {async_channel::Sender, tracing::debug};

use crate::{audio::track::Track, error::PlaybackError};

/// Sample layout of a decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: usize,
}

/// Playback progress of the live stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Time played since the stream started.
    pub elapsed: Duration,
    /// Total length of the stream, if known.
    pub total: Option<Duration>,
}

impl Progress {
    /// Fraction of the stream played so far, `offset` being where playback started.
    ///
    /// Returns `None` when the total length is unknown or zero.
    #[must_use]
    pub fn fraction(&self, offset: Duration) -> Option<f64> {
        let total = self.total.filter(|total| !total.is_zero())?;
        Some((offset + self.elapsed).as_secs_f64() / total.as_secs_f64())
    }
}

/// Identifier of one playback session.
///
/// Session ids increase monotonically; a completion tagged with an id other
/// than the live session's is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// One-shot notification that a session finished playing.
///
/// Notifying never blocks, so it is safe to call from an audio callback.
#[derive(Debug)]
pub struct CompletionNotifier {
    session: SessionId,
    tx: Sender<SessionId>,
}

impl CompletionNotifier {
    pub(crate) fn new(session: SessionId, tx: Sender<SessionId>) -> Self {
        Self { session, tx }
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Reports the session as finished.
    pub fn notify(self) {
        if let Err(e) = self.tx.try_send(self.session) {
            debug!("Completion for session {:?} dropped: {e}", self.session);
        }
    }
}

/// A decoded, seekable stream of interleaved `f32` samples.
///
/// Dropping the source closes the underlying file.
pub trait SampleSource: Send {
    /// Sample layout of the stream.
    fn spec(&self) -> StreamSpec;

    /// Total length of the stream, if known.
    fn duration(&self) -> Option<Duration>;

    /// Moves the read position to `position` from the start.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the stream cannot seek.
    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError>;

    /// Decodes the next chunk of interleaved samples.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the stream cannot be read further.
    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, PlaybackError>;
}

/// Opens tracks for decoding.
pub trait TrackDecoder {
    /// Opens `track` and prepares it for decoding.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::UnsupportedFormat` for tracks without a
    /// recognised format and `PlaybackError::DecodeFailure` for unreadable files.
    fn open(&self, track: &Track) -> Result<Box<dyn SampleSource>, PlaybackError>;
}

/// The exclusive audio output device.
///
/// At most one stream plays at a time. `play` is only called after a
/// successful `init` and after `clear` released the previous stream.
pub trait OutputDevice {
    /// Prepares the device for a stream with the given layout.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::DeviceFailure` if the device is unavailable
    /// or cannot play at the requested sample rate.
    fn init(&mut self, spec: StreamSpec) -> Result<(), PlaybackError>;

    /// Starts playing `source`, calling `on_complete` once it has been fully played.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::DeviceFailure` if the stream cannot start.
    fn play(
        &mut self,
        source: Box<dyn SampleSource>,
        on_complete: CompletionNotifier,
    ) -> Result<(), PlaybackError>;

    /// Pauses or resumes the live stream.
    fn set_paused(&mut self, paused: bool);

    /// Sets the linear gain applied to the live stream and to later streams.
    fn set_volume(&mut self, gain: f32);

    /// Silences and releases the live stream, if any.
    fn clear(&mut self);

    /// Progress of the live stream, if any.
    fn progress(&self) -> Option<Progress>;
}

/// Decoder and output pair driven by the control loop.
pub type Backend = (Box<dyn TrackDecoder>, Box<dyn OutputDevice>);
