//! In-memory decoder and output device for control loop tests.

use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{
    audio::{
        backend::{
            Backend, CompletionNotifier, OutputDevice, Progress, SampleSource, StreamSpec,
            TrackDecoder,
        },
        decoder::DecoderError,
        output::OutputError,
        track::Track,
    },
    error::PlaybackError,
};

/// Length reported by every mock stream.
pub const MOCK_DURATION: Duration = Duration::from_secs(100);

#[derive(Default)]
struct MockState {
    opened: Vec<Track>,
    seeks: Vec<Duration>,
    notifiers: Vec<Option<CompletionNotifier>>,
    failing: HashSet<PathBuf>,
    fail_init: bool,
    active: bool,
    paused: bool,
    gain: f32,
    clears: usize,
    elapsed_fraction: f64,
}

/// Shared handle used by tests to script and inspect the mock backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the decoder and output pair for `Player::with_backend`.
    pub fn factory(&self) -> impl FnOnce() -> Backend + Send + 'static {
        let state = Arc::clone(&self.state);
        move || -> Backend {
            let decoder: Box<dyn TrackDecoder> = Box::new(MockDecoder {
                state: Arc::clone(&state),
            });
            let output: Box<dyn OutputDevice> = Box::new(MockOutput { state });
            (decoder, output)
        }
    }

    /// Makes opening `path` fail with a decode error.
    pub fn fail_path(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing.insert(path.into());
    }

    /// Makes the output device refuse to initialise.
    pub fn fail_init(&self, fail: bool) {
        self.state.lock().fail_init = fail;
    }

    /// Tracks opened so far, in order.
    pub fn opened(&self) -> Vec<Track> {
        self.state.lock().opened.clone()
    }

    /// Seek positions requested so far.
    pub fn seeks(&self) -> Vec<Duration> {
        self.state.lock().seeks.clone()
    }

    /// Fires the completion notifier of the `index`-th started stream.
    ///
    /// Returns `false` if it was already fired or never existed.
    pub fn finish(&self, index: usize) -> bool {
        let notifier = self
            .state
            .lock()
            .notifiers
            .get_mut(index)
            .and_then(Option::take);
        notifier.map(CompletionNotifier::notify).is_some()
    }

    /// Fires the completion notifier of the most recently started stream.
    pub fn finish_latest(&self) -> bool {
        let count = self.state.lock().notifiers.len();
        count > 0 && self.finish(count - 1)
    }

    /// Sets how much of the live stream has played, as a fraction of its length.
    pub fn set_elapsed_fraction(&self, fraction: f64) {
        self.state.lock().elapsed_fraction = fraction;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn gain(&self) -> f32 {
        self.state.lock().gain
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }
}

struct MockDecoder {
    state: Arc<Mutex<MockState>>,
}

impl TrackDecoder for MockDecoder {
    fn open(&self, track: &Track) -> Result<Box<dyn SampleSource>, PlaybackError> {
        if track.format().is_none() {
            return Err(PlaybackError::UnsupportedFormat {
                path: track.path().to_path_buf(),
            });
        }

        let mut state = self.state.lock();
        if state.failing.contains(track.path()) {
            return Err(DecoderError::NoAudioTrack.into());
        }
        state.opened.push(track.clone());

        Ok(Box::new(MockSource {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSource {
    state: Arc<Mutex<MockState>>,
}

impl SampleSource for MockSource {
    fn spec(&self) -> StreamSpec {
        StreamSpec {
            sample_rate: 44100,
            channels: 2,
        }
    }

    fn duration(&self) -> Option<Duration> {
        Some(MOCK_DURATION)
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        self.state.lock().seeks.push(position);
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
        Ok(None)
    }
}

struct MockOutput {
    state: Arc<Mutex<MockState>>,
}

impl OutputDevice for MockOutput {
    fn init(&mut self, _spec: StreamSpec) -> Result<(), PlaybackError> {
        if self.state.lock().fail_init {
            return Err(OutputError::NoDeviceFound.into());
        }
        Ok(())
    }

    fn play(
        &mut self,
        _source: Box<dyn SampleSource>,
        on_complete: CompletionNotifier,
    ) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.notifiers.push(Some(on_complete));
        state.active = true;
        state.paused = false;
        state.elapsed_fraction = 0.0;
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.state.lock().paused = paused;
    }

    fn set_volume(&mut self, gain: f32) {
        self.state.lock().gain = gain;
    }

    fn clear(&mut self) {
        let mut state = self.state.lock();
        if state.active {
            state.active = false;
            state.clears += 1;
        }
    }

    fn progress(&self) -> Option<Progress> {
        let state = self.state.lock();
        state.active.then(|| Progress {
            elapsed: MOCK_DURATION.mul_f64(state.elapsed_fraction),
            total: Some(MOCK_DURATION),
        })
    }
}
