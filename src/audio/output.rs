//! Audio output management using the `cpal` crate.
//!
//! This module owns the output device, selects a stream configuration for
//! each decoded track, and moves decoded samples from a decoder thread to the
//! device callback through an `rtrb` ring buffer.

use std::{
    io::Error as StdError,
    sync::{
        Arc,
        atomic::{
            AtomicBool, AtomicU32, AtomicU64,
            Ordering::{Acquire, Relaxed, Release},
        },
    },
    thread::{Builder, JoinHandle, sleep},
    time::Duration,
};

use {
    cpal::{
        BuildStreamError, Device, DevicesError, OutputCallbackInfo, PlayStreamError,
        SampleFormat::{self, F32, I16, U16},
        Stream, StreamConfig, StreamError, SupportedStreamConfigsError, default_host,
        traits::{DeviceTrait, HostTrait, StreamTrait},
    },
    rtrb::{Consumer, Producer, PushError::Full, RingBuffer},
    thiserror::Error,
    tracing::{debug, error, info, warn},
};

use crate::{
    audio::backend::{CompletionNotifier, OutputDevice, Progress, SampleSource, StreamSpec},
    config::UserSettings,
    error::PlaybackError,
};

/// Sleep duration when the ring buffer is full.
const PRODUCER_SLEEP_DURATION: Duration = Duration::from_micros(100);

/// Error type for audio output operations.
#[derive(Error, Debug)]
pub enum OutputError {
    /// CPAL stream creation error.
    #[error("Audio output error: {0}")]
    CpalError(#[from] BuildStreamError),
    /// Failed to start audio stream.
    #[error("Failed to start audio stream: {0}")]
    StreamStartError(#[from] PlayStreamError),
    /// The host could not enumerate its output devices.
    #[error("Failed to list output devices: {0}")]
    DevicesError(#[from] DevicesError),
    /// The device could not report its supported configurations.
    #[error("Failed to query device configurations: {0}")]
    SupportedConfigsError(#[from] SupportedStreamConfigsError),
    /// No suitable audio device found.
    #[error("No suitable audio device found")]
    NoDeviceFound,
    /// The configured device does not exist.
    #[error("Output device not found: {name}")]
    DeviceNotFound { name: String },
    /// The device cannot play at the source sample rate.
    #[error("Sample rate {sample_rate} Hz not supported by the output device")]
    UnsupportedSampleRate { sample_rate: u32 },
    /// Unsupported sample format.
    #[error("Unsupported sample format: {format:?}")]
    UnsupportedSampleFormat { format: SampleFormat },
    /// The stream declares no channels.
    #[error("Stream has no channels")]
    EmptyChannelLayout,
    /// `play` was called before a successful `init`.
    #[error("Output device is not initialised")]
    NotInitialised,
    /// The decoder thread could not be spawned.
    #[error("Failed to spawn decoder thread: {0}")]
    ThreadSpawnError(StdError),
}

/// Audio output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Name of the output device, or `None` for the host default.
    pub device_name: Option<String>,
    /// Stream callback timeout in milliseconds.
    pub buffer_duration_ms: u32,
    /// Capacity of the decoder-to-device ring buffer, in samples.
    pub ring_buffer_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device_name: None,
            buffer_duration_ms: 50,
            ring_buffer_capacity: 16384,
        }
    }
}

impl From<&UserSettings> for OutputConfig {
    fn from(settings: &UserSettings) -> Self {
        Self {
            device_name: settings.audio_device.clone(),
            buffer_duration_ms: settings.buffer_duration_ms,
            ring_buffer_capacity: settings.ring_buffer_capacity,
        }
    }
}

/// Gain and pause flag shared with every stream callback.
#[derive(Debug)]
struct PlaybackControls {
    /// Linear gain stored as `f32` bits.
    gain: AtomicU32,
    paused: AtomicBool,
}

impl Default for PlaybackControls {
    fn default() -> Self {
        Self {
            gain: AtomicU32::new(1.0_f32.to_bits()),
            paused: AtomicBool::new(false),
        }
    }
}

/// Per-stream counters shared by the decoder thread and the callback.
#[derive(Debug, Default)]
struct StreamProgress {
    frames_played: AtomicU64,
    decoding_done: AtomicBool,
}

/// Decodes a source into the ring buffer on a dedicated thread.
struct SampleFeeder {
    source: Box<dyn SampleSource>,
    producer: Producer<f32>,
    progress: Arc<StreamProgress>,
}

impl SampleFeeder {
    /// Runs until the source is exhausted or the consumer side is dropped.
    fn run(mut self) {
        loop {
            match self.source.next_chunk() {
                Ok(Some(samples)) => {
                    if !self.push_all(&samples) {
                        debug!("Output stream released, stopping decoder thread");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Decoding stopped early: {e}");
                    break;
                }
            }
        }
        self.progress.decoding_done.store(true, Release);
    }

    /// Pushes every sample, waiting while the ring is full.
    ///
    /// Returns `false` if the consumer was dropped.
    fn push_all(&mut self, samples: &[f32]) -> bool {
        for &sample in samples {
            loop {
                if self.producer.is_abandoned() {
                    return false;
                }
                match self.producer.push(sample) {
                    Ok(()) => break,
                    Err(Full(_)) => sleep(PRODUCER_SLEEP_DURATION),
                }
            }
        }
        true
    }
}

/// Stream callback state: pulls frames from the ring and writes device frames.
struct Renderer {
    consumer: Consumer<f32>,
    /// Scratch space for one source frame.
    frame: Vec<f32>,
    out_channels: usize,
    controls: Arc<PlaybackControls>,
    progress: Arc<StreamProgress>,
    on_complete: Option<CompletionNotifier>,
}

impl Renderer {
    /// Fills `data` with device frames, converting each sample with `convert`.
    ///
    /// Source channels map onto device channels by index; extra device
    /// channels repeat the last source channel.
    fn render<T: Copy>(&mut self, data: &mut [T], convert: impl Fn(f32) -> T) {
        let silence = convert(0.0);
        if self.controls.paused.load(Relaxed) {
            data.fill(silence);
            return;
        }

        let gain = f32::from_bits(self.controls.gain.load(Relaxed));
        let last = self.frame.len() - 1;
        let mut played = 0;

        for out in data.chunks_mut(self.out_channels) {
            if self.consumer.slots() < self.frame.len() {
                out.fill(silence);
                continue;
            }
            for slot in &mut self.frame {
                *slot = self.consumer.pop().unwrap_or(0.0);
            }
            for (channel, sample) in out.iter_mut().enumerate() {
                *sample = convert((self.frame[channel.min(last)] * gain).clamp(-1.0, 1.0));
            }
            played += 1;
        }

        if played > 0 {
            self.progress.frames_played.fetch_add(played, Relaxed);
        } else if self.progress.decoding_done.load(Acquire)
            && self.consumer.slots() < self.frame.len()
            && let Some(on_complete) = self.on_complete.take()
        {
            on_complete.notify();
        }
    }
}

/// The stream currently bound to the device.
struct ActiveStream {
    _stream: Stream,
    feeder: Option<JoinHandle<()>>,
    progress: Arc<StreamProgress>,
    sample_rate: u32,
    total: Option<Duration>,
}

/// Output device backed by the host's audio API.
///
/// The device is acquired lazily on the first `init`, so a machine without
/// audio hardware only fails when playback is attempted.
pub struct CpalOutput {
    config: OutputConfig,
    device: Option<Device>,
    stream_config: Option<(StreamConfig, SampleFormat)>,
    controls: Arc<PlaybackControls>,
    active: Option<ActiveStream>,
}

impl CpalOutput {
    /// Creates an output that has not yet claimed a device.
    #[must_use]
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            device: None,
            stream_config: None,
            controls: Arc::new(PlaybackControls::default()),
            active: None,
        }
    }

    /// Names of the host's output devices.
    #[must_use]
    pub fn available_devices() -> Vec<String> {
        match default_host().output_devices() {
            Ok(devices) => devices
                .filter_map(|device| device.description().ok().map(|desc| desc.to_string()))
                .collect(),
            Err(e) => {
                warn!("Failed to list output devices: {e}");
                Vec::new()
            }
        }
    }

    /// Returns the claimed device, claiming it first if needed.
    fn device(&mut self) -> Result<&Device, OutputError> {
        if self.device.is_none() {
            let device = Self::open_device(self.config.device_name.as_deref())?;
            info!(
                "Using output device {}",
                device
                    .description()
                    .map(|desc| desc.to_string())
                    .unwrap_or_else(|_| "Unknown".to_string())
            );
            self.device = Some(device);
        }
        self.device.as_ref().ok_or(OutputError::NoDeviceFound)
    }

    fn open_device(name: Option<&str>) -> Result<Device, OutputError> {
        let host = default_host();
        match name {
            None => host
                .default_output_device()
                .ok_or(OutputError::NoDeviceFound),
            Some(name) => host
                .output_devices()?
                .find(|device| {
                    device
                        .description()
                        .is_ok_and(|desc| desc.to_string() == name)
                })
                .ok_or_else(|| OutputError::DeviceNotFound {
                    name: name.to_string(),
                }),
        }
    }

    /// Picks a device configuration that plays `spec` at its native rate.
    ///
    /// Configurations with a matching channel count win, then `f32` output.
    fn select_config(
        device: &Device,
        spec: StreamSpec,
    ) -> Result<(StreamConfig, SampleFormat), OutputError> {
        let range = device
            .supported_output_configs()?
            .filter(|range| matches!(range.sample_format(), F32 | I16 | U16))
            .filter(|range| {
                range.min_sample_rate() <= spec.sample_rate
                    && spec.sample_rate <= range.max_sample_rate()
            })
            .max_by_key(|range| {
                (
                    usize::from(range.channels()) == spec.channels,
                    range.sample_format() == F32,
                )
            })
            .ok_or(OutputError::UnsupportedSampleRate {
                sample_rate: spec.sample_rate,
            })?;

        let supported = range.with_sample_rate(spec.sample_rate);
        Ok((supported.config(), supported.sample_format()))
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        mut renderer: Renderer,
        buffer_duration_ms: u32,
    ) -> Result<Stream, OutputError> {
        let err_fn = |err: StreamError| error!("Audio stream error: {err}");
        let timeout = Some(Duration::from_millis(u64::from(buffer_duration_ms)));

        let stream = match sample_format {
            F32 => device.build_output_stream(
                config,
                move |data: &mut [f32], _: &OutputCallbackInfo| {
                    renderer.render(data, |sample| sample);
                },
                err_fn,
                timeout,
            )?,
            I16 => device.build_output_stream(
                config,
                move |data: &mut [i16], _: &OutputCallbackInfo| {
                    renderer.render(data, |sample| (sample * f32::from(i16::MAX)) as i16);
                },
                err_fn,
                timeout,
            )?,
            U16 => device.build_output_stream(
                config,
                move |data: &mut [u16], _: &OutputCallbackInfo| {
                    renderer.render(data, |sample| {
                        ((sample + 1.0) * f32::from(u16::MAX) / 2.0) as u16
                    });
                },
                err_fn,
                timeout,
            )?,
            format => return Err(OutputError::UnsupportedSampleFormat { format }),
        };

        Ok(stream)
    }
}

impl OutputDevice for CpalOutput {
    fn init(&mut self, spec: StreamSpec) -> Result<(), PlaybackError> {
        self.clear();
        if spec.channels == 0 {
            return Err(OutputError::EmptyChannelLayout.into());
        }

        let (config, sample_format) = Self::select_config(self.device()?, spec)?;
        info!(
            "Output initialised at {} Hz, {} channels, {sample_format:?}",
            spec.sample_rate, config.channels
        );
        self.stream_config = Some((config, sample_format));
        Ok(())
    }

    fn play(
        &mut self,
        source: Box<dyn SampleSource>,
        on_complete: CompletionNotifier,
    ) -> Result<(), PlaybackError> {
        self.clear();
        let (config, sample_format) = self
            .stream_config
            .clone()
            .ok_or(OutputError::NotInitialised)?;

        let spec = source.spec();
        let total = source.duration();
        let (producer, consumer) = RingBuffer::<f32>::new(self.config.ring_buffer_capacity);
        let progress = Arc::new(StreamProgress::default());

        let feeder = SampleFeeder {
            source,
            producer,
            progress: Arc::clone(&progress),
        };
        let renderer = Renderer {
            consumer,
            frame: vec![0.0; spec.channels.max(1)],
            out_channels: usize::from(config.channels).max(1),
            controls: Arc::clone(&self.controls),
            progress: Arc::clone(&progress),
            on_complete: Some(on_complete),
        };
        self.controls.paused.store(false, Relaxed);

        let buffer_duration_ms = self.config.buffer_duration_ms;
        let stream = Self::build_stream(
            self.device()?,
            &config,
            sample_format,
            renderer,
            buffer_duration_ms,
        )?;

        let feeder = Builder::new()
            .name("chime-decoder".to_string())
            .spawn(move || feeder.run())
            .map_err(OutputError::ThreadSpawnError)?;

        stream.play().map_err(OutputError::from)?;

        self.active = Some(ActiveStream {
            _stream: stream,
            feeder: Some(feeder),
            progress,
            sample_rate: spec.sample_rate,
            total,
        });
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.controls.paused.store(paused, Relaxed);
    }

    fn set_volume(&mut self, gain: f32) {
        self.controls.gain.store(gain.to_bits(), Relaxed);
    }

    fn clear(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!("Releasing output stream");
            let feeder = active.feeder.take();

            // Dropping the stream drops the consumer, which stops the feeder.
            drop(active);

            if let Some(feeder) = feeder
                && feeder.join().is_err()
            {
                error!("Decoder thread panicked");
            }
        }
    }

    fn progress(&self) -> Option<Progress> {
        self.active.as_ref().map(|active| {
            let frames = active.progress.frames_played.load(Relaxed);
            Progress {
                elapsed: Duration::from_secs_f64(frames as f64 / f64::from(active.sample_rate)),
                total: active.total,
            }
        })
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::Ordering::{Relaxed, Release},
        },
        time::Duration,
    };

    use {async_channel::unbounded, cpal::SupportedStreamConfigsError, rtrb::RingBuffer};

    use crate::{
        audio::{
            backend::{CompletionNotifier, SampleSource, SessionId, StreamSpec},
            output::{
                OutputConfig, OutputError, PlaybackControls, Renderer, SampleFeeder,
                StreamProgress,
            },
        },
        config::UserSettings,
        error::PlaybackError,
    };

    /// Source that yields fixed chunks.
    struct ChunkSource {
        chunks: Vec<Vec<f32>>,
    }

    impl SampleSource for ChunkSource {
        fn spec(&self) -> StreamSpec {
            StreamSpec {
                sample_rate: 8000,
                channels: 1,
            }
        }

        fn duration(&self) -> Option<Duration> {
            None
        }

        fn seek(&mut self, _position: Duration) -> Result<(), PlaybackError> {
            Ok(())
        }

        fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
            Ok((!self.chunks.is_empty()).then(|| self.chunks.remove(0)))
        }
    }

    fn renderer(
        capacity: usize,
        source_channels: usize,
        out_channels: usize,
    ) -> (
        Renderer,
        rtrb::Producer<f32>,
        async_channel::Receiver<SessionId>,
    ) {
        let (producer, consumer) = RingBuffer::new(capacity);
        let (tx, rx) = unbounded();
        let renderer = Renderer {
            consumer,
            frame: vec![0.0; source_channels],
            out_channels,
            controls: Arc::new(PlaybackControls::default()),
            progress: Arc::new(StreamProgress::default()),
            on_complete: Some(CompletionNotifier::new(SessionId(3), tx)),
        };
        (renderer, producer, rx)
    }

    #[test]
    fn test_output_config_default() {
        let config = OutputConfig::default();
        assert_eq!(config.device_name, None);
        assert_eq!(config.buffer_duration_ms, 50);
        assert_eq!(config.ring_buffer_capacity, 16384);
    }

    #[test]
    fn test_output_config_from_settings() {
        let settings = UserSettings {
            audio_device: Some("USB DAC".to_string()),
            buffer_duration_ms: 80,
            ..UserSettings::default()
        };
        let config = OutputConfig::from(&settings);
        assert_eq!(config.device_name.as_deref(), Some("USB DAC"));
        assert_eq!(config.buffer_duration_ms, 80);
    }

    #[test]
    fn test_output_error_display() {
        assert_eq!(
            OutputError::NoDeviceFound.to_string(),
            "No suitable audio device found"
        );
        assert_eq!(
            OutputError::UnsupportedSampleRate { sample_rate: 12345 }.to_string(),
            "Sample rate 12345 Hz not supported by the output device"
        );
    }

    #[test]
    fn test_config_query_error_is_preserved() {
        let error = OutputError::from(SupportedStreamConfigsError::DeviceNotAvailable);
        assert!(matches!(
            error,
            OutputError::SupportedConfigsError(SupportedStreamConfigsError::DeviceNotAvailable)
        ));
        assert!(
            error
                .to_string()
                .starts_with("Failed to query device configurations: ")
        );
    }

    #[test]
    fn test_render_applies_gain_and_maps_channels() {
        let (mut renderer, mut producer, _rx) = renderer(16, 1, 2);
        renderer.controls.gain.store(0.5_f32.to_bits(), Relaxed);
        producer.push(0.5).unwrap();
        producer.push(-0.25).unwrap();

        let mut data = [1.0_f32; 4];
        renderer.render(&mut data, |sample| sample);

        assert_eq!(data, [0.25, 0.25, -0.125, -0.125]);
        assert_eq!(renderer.progress.frames_played.load(Relaxed), 2);
    }

    #[test]
    fn test_render_outputs_silence_while_paused() {
        let (mut renderer, mut producer, _rx) = renderer(16, 2, 2);
        renderer.controls.paused.store(true, Relaxed);
        producer.push(0.5).unwrap();
        producer.push(0.5).unwrap();

        let mut data = [1.0_f32; 2];
        renderer.render(&mut data, |sample| sample);

        assert_eq!(data, [0.0, 0.0]);
        assert_eq!(renderer.consumer.slots(), 2);
    }

    #[test]
    fn test_render_clamps_converted_samples() {
        let (mut renderer, mut producer, _rx) = renderer(16, 1, 1);
        renderer.controls.gain.store(4.0_f32.to_bits(), Relaxed);
        producer.push(0.5).unwrap();

        let mut data = [0_i16; 1];
        renderer.render(&mut data, |sample| (sample * f32::from(i16::MAX)) as i16);
        assert_eq!(data, [i16::MAX]);
    }

    #[test]
    fn test_render_notifies_once_after_drain() {
        let (mut renderer, mut producer, rx) = renderer(16, 1, 1);
        producer.push(0.1).unwrap();

        let mut data = [0.0_f32; 4];
        renderer.render(&mut data, |sample| sample);
        assert!(rx.try_recv().is_err());

        renderer.progress.decoding_done.store(true, Release);
        renderer.render(&mut data, |sample| sample);
        assert_eq!(rx.try_recv().unwrap(), SessionId(3));

        renderer.render(&mut data, |sample| sample);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_feeder_fills_ring_and_marks_done() {
        let (producer, mut consumer) = RingBuffer::new(16);
        let progress = Arc::new(StreamProgress::default());
        let feeder = SampleFeeder {
            source: Box::new(ChunkSource {
                chunks: vec![vec![0.1, 0.2], vec![0.3]],
            }),
            producer,
            progress: Arc::clone(&progress),
        };

        feeder.run();

        assert!(progress.decoding_done.load(Relaxed));
        assert_eq!(consumer.pop(), Ok(0.1));
        assert_eq!(consumer.pop(), Ok(0.2));
        assert_eq!(consumer.pop(), Ok(0.3));
    }

    #[test]
    fn test_feeder_stops_when_consumer_dropped() {
        let (producer, consumer) = RingBuffer::new(1);
        drop(consumer);
        let progress = Arc::new(StreamProgress::default());
        let feeder = SampleFeeder {
            source: Box::new(ChunkSource {
                chunks: vec![vec![0.1, 0.2, 0.3]],
            }),
            producer,
            progress: Arc::clone(&progress),
        };

        feeder.run();

        assert!(!progress.decoding_done.load(Relaxed));
    }
}
