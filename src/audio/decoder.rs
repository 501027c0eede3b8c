//! Audio file decoding using the `symphonia` crate.
//!
//! This module opens tracks, probes their container and codec, and yields
//! decoded audio as interleaved `f32` samples for the output device.

use std::{
    fs::File,
    io::{Error as StdError, ErrorKind::UnexpectedEof},
    time::Duration,
};

use {
    symphonia::{
        core::{
            audio::SampleBuffer,
            codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions},
            errors::Error as SymphoniaError,
            formats::{FormatOptions, FormatReader, SeekMode::Coarse, SeekTo::Time},
            io::{MediaSourceStream, MediaSourceStreamOptions},
            meta::MetadataOptions,
            probe::Hint,
            units::Time as OtherTime,
        },
        default::{get_codecs, get_probe},
    },
    thiserror::Error,
    tracing::{debug, warn},
};

use crate::{
    audio::{
        backend::{SampleSource, StreamSpec, TrackDecoder},
        track::Track,
    },
    error::PlaybackError,
};

/// Sample rate assumed when the container does not declare one.
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Error type for audio decoding operations.
#[derive(Error, Debug)]
pub enum DecoderError {
    /// Failed to open or read the audio file.
    #[error("IO error: {0}")]
    IoError(#[from] StdError),
    /// Symphonia decoding error.
    #[error("Decoding error: {0}")]
    SymphoniaError(#[from] SymphoniaError),
    /// No audio track found in file.
    #[error("No audio track found")]
    NoAudioTrack,
}

/// Opens tracks with symphonia's default probe and codec registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl TrackDecoder for SymphoniaDecoder {
    fn open(&self, track: &Track) -> Result<Box<dyn SampleSource>, PlaybackError> {
        let format = track
            .format()
            .ok_or_else(|| PlaybackError::UnsupportedFormat {
                path: track.path().to_path_buf(),
            })?;

        debug!("Opening {} as {format}", track.path().display());

        let file = File::open(track.path()).map_err(DecoderError::from)?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecoderError::from)?;

        Ok(Box::new(SymphoniaSource::new(probed.format)?))
    }
}

/// A symphonia format reader and decoder for a single audio track.
pub struct SymphoniaSource {
    /// The underlying format reader.
    format_reader: Box<dyn FormatReader>,
    /// The active audio decoder.
    decoder: Box<dyn Decoder>,
    /// Id of the decoded track within the container.
    track_id: u32,
    /// Sample layout of the decoded stream.
    spec: StreamSpec,
    /// Total length, if the container declares a frame count.
    duration: Option<Duration>,
}

impl SymphoniaSource {
    /// Selects the first decodable track of `format_reader` and builds its decoder.
    ///
    /// # Errors
    ///
    /// Returns `DecoderError` if the container holds no audio track or the
    /// codec is not supported.
    pub fn new(format_reader: Box<dyn FormatReader>) -> Result<Self, DecoderError> {
        let track = format_reader
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoAudioTrack)?;

        let codec_params = &track.codec_params;
        let sample_rate = codec_params.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE);
        let channels = codec_params
            .channels
            .ok_or(DecoderError::NoAudioTrack)?
            .count();

        let duration = codec_params
            .n_frames
            .filter(|_| sample_rate > 0)
            .map(|frames| Duration::from_secs_f64(frames as f64 / f64::from(sample_rate)));

        let decoder = get_codecs().make(codec_params, &DecoderOptions::default())?;
        let track_id = track.id;

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            spec: StreamSpec {
                sample_rate,
                channels,
            },
            duration,
        })
    }
}

impl SampleSource for SymphoniaSource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn seek(&mut self, position: Duration) -> Result<(), PlaybackError> {
        let time = OtherTime::new(position.as_secs(), f64::from(position.subsec_nanos()) / 1e9);
        self.format_reader
            .seek(
                Coarse,
                Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(DecoderError::from)?;
        self.decoder.reset();
        Ok(())
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<f32>>, PlaybackError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == UnexpectedEof => return Ok(None),
                Err(e) => return Err(DecoderError::from(e).into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let mut samples =
                        SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                    samples.copy_interleaved_ref(decoded);
                    return Ok(Some(samples.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet: {e}");
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == UnexpectedEof => return Ok(None),
                Err(e) => return Err(DecoderError::from(e).into()),
            }
        }
    }
}
