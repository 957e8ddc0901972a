//! Clip decoding.
//!
//! [`Decoder`] is the capability the playback controller consumes: given an
//! opened byte stream and a [`ClipFormat`] hint it returns the fully decoded
//! clip.  Soundboard clips are short, so decoding straight into memory keeps
//! the clip seekable and trivially closeable.
//!
//! [`SymphoniaDecoder`] is the production implementation.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ClipStream
// ---------------------------------------------------------------------------

/// Byte streams a [`Decoder`] can read from.
pub trait ReadSeek: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> ReadSeek for T {}

/// An opened clip file (or any other seekable byte source).
pub type ClipStream = Box<dyn ReadSeek>;

// ---------------------------------------------------------------------------
// ClipFormat
// ---------------------------------------------------------------------------

/// Container format of a clip, guessed from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    Flac,
    Wav,
    Mp3,
    /// Ogg Vorbis, also the fallback for unrecognised names.
    Vorbis,
}

impl ClipFormat {
    /// Guess the format from `path`.
    ///
    /// The lowercase path is searched for `.flac`, `.wav` and `.mp3` in that
    /// order; anything else is treated as Ogg Vorbis.
    ///
    /// ```
    /// use std::path::Path;
    /// use soundboard::audio::ClipFormat;
    ///
    /// assert_eq!(ClipFormat::from_path(Path::new("a/Boom.WAV")), ClipFormat::Wav);
    /// assert_eq!(ClipFormat::from_path(Path::new("a/boom.ogg")), ClipFormat::Vorbis);
    /// assert_eq!(ClipFormat::from_path(Path::new("a/boom")), ClipFormat::Vorbis);
    /// ```
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy().to_lowercase();
        if name.contains(".flac") {
            Self::Flac
        } else if name.contains(".wav") {
            Self::Wav
        } else if name.contains(".mp3") {
            Self::Mp3
        } else {
            Self::Vorbis
        }
    }

    /// File extension passed to the format prober as a hint.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Vorbis => "ogg",
        }
    }
}

// ---------------------------------------------------------------------------
// DecodedClip
// ---------------------------------------------------------------------------

/// A fully decoded clip: interleaved `f32` PCM in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub channels: u16,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
}

impl DecodedClip {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported {format:?} stream: {reason}")]
    Unsupported { format: ClipFormat, reason: String },

    #[error("no audio track found")]
    NoTrack,

    #[error("stream does not declare a sample rate")]
    NoSampleRate,

    #[error("stream holds no audio frames")]
    Empty,

    #[error("corrupt audio data: {0}")]
    Corrupt(String),

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    fn from_symphonia(err: SymphoniaError, format: ClipFormat) -> Self {
        match err {
            SymphoniaError::IoError(e) => Self::Io(e),
            SymphoniaError::Unsupported(reason) => Self::Unsupported {
                format,
                reason: reason.to_string(),
            },
            other => Self::Corrupt(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe decoding capability.
///
/// Implementations are called from tokio's blocking pool and may take as
/// long as they need.
pub trait Decoder: Send + Sync {
    /// Decode the whole of `stream`.
    fn decode(&self, stream: ClipStream, format: ClipFormat) -> Result<DecodedClip, DecodeError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Decoder>) {}
};

// ---------------------------------------------------------------------------
// SymphoniaDecoder
// ---------------------------------------------------------------------------

/// [`Decoder`] backed by symphonia (FLAC, WAV, MP3, Ogg Vorbis).
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

/// Adapts a [`ClipStream`] to symphonia's [`MediaSource`].
struct StreamSource(ClipStream);

impl Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for StreamSource {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.0.seek(pos)
    }
}

impl MediaSource for StreamSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, stream: ClipStream, format: ClipFormat) -> Result<DecodedClip, DecodeError> {
        let err = |e| DecodeError::from_symphonia(e, format);

        let mss = MediaSourceStream::new(Box::new(StreamSource(stream)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(err)?;
        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(err)?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(err(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate.get_or_insert(spec.rate);
                    channels.get_or_insert(spec.channels.count() as u16);

                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("skipping undecodable packet: {e}");
                }
                Err(e) => return Err(err(e)),
            }
        }

        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }

        Ok(DecodedClip {
            samples,
            channels: channels.unwrap_or(2),
            sample_rate: sample_rate.ok_or(DecodeError::NoSampleRate)?,
        })
    }
}

// ---------------------------------------------------------------------------
// MockDecoder (tests only)
// ---------------------------------------------------------------------------

/// Decoder for tests that reads a one-line clip description instead of
/// real audio, e.g. `rate=44100 frames=4410 channels=2 delay_ms=20`.
///
/// The content `corrupt` makes decoding fail.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDecoder;

#[cfg(test)]
impl MockDecoder {
    /// File contents describing a clip of constant amplitude.
    pub fn describe(sample_rate: u32, frames: usize, channels: u16) -> String {
        format!("rate={sample_rate} frames={frames} channels={channels}")
    }

    /// Like [`MockDecoder::describe`], but decoding blocks for `delay_ms`.
    pub fn describe_with_delay(
        sample_rate: u32,
        frames: usize,
        channels: u16,
        delay_ms: u64,
    ) -> String {
        format!(
            "{} delay_ms={delay_ms}",
            Self::describe(sample_rate, frames, channels)
        )
    }
}

#[cfg(test)]
impl Decoder for MockDecoder {
    fn decode(&self, mut stream: ClipStream, _format: ClipFormat) -> Result<DecodedClip, DecodeError> {
        let mut text = String::new();
        stream.read_to_string(&mut text)?;

        let (mut rate, mut frames, mut channels, mut delay_ms) = (None, None, 2u16, 0u64);
        for field in text.split_whitespace() {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| DecodeError::Corrupt(field.to_string()))?;
            let bad = |_| DecodeError::Corrupt(field.to_string());
            match key {
                "rate" => rate = Some(value.parse::<u32>().map_err(bad)?),
                "frames" => frames = Some(value.parse::<usize>().map_err(bad)?),
                "channels" => channels = value.parse().map_err(bad)?,
                "delay_ms" => delay_ms = value.parse().map_err(bad)?,
                _ => return Err(DecodeError::Corrupt(field.to_string())),
            }
        }

        std::thread::sleep(Duration::from_millis(delay_ms));

        let rate = rate.ok_or(DecodeError::NoSampleRate)?;
        let frames = frames.ok_or(DecodeError::Empty)?;
        Ok(DecodedClip::new(
            vec![0.25; frames * channels as usize],
            channels,
            rate,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
