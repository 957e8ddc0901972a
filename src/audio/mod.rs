//! Audio plumbing: decoding → rate/channel adaptation → mixer → output device.
//!
//! # Pipeline
//!
//! ```text
//! clip file → Decoder (symphonia) → DecodedClip → resample_clip → remix_channels
//!           → Mixer voice ─(device lock)─ cpal callback → speakers
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use soundboard::audio::{
//!     remix_channels, ClipFormat, CpalSink, Decoder, DeviceSink, SymphoniaDecoder,
//! };
//!
//! let sink = CpalSink::open_default().unwrap();
//! let clip = SymphoniaDecoder
//!     .decode(Box::new(File::open("sounds/startup.wav").unwrap()), ClipFormat::Wav)
//!     .unwrap();
//!
//! sink.initialize(clip.sample_rate).unwrap();
//! let clip = remix_channels(clip, sink.channels());
//! let (_voice, done) = sink.lock().add(clip);
//! let _ = done.blocking_recv(); // returns once the clip has played out
//! ```

pub mod decoder;
pub mod mixer;
pub mod output;
pub mod resample;

pub use decoder::{ClipFormat, ClipStream, DecodeError, DecodedClip, Decoder, SymphoniaDecoder};
pub use mixer::{Mixer, VoiceCompletion, VoiceId};
pub use output::{CpalSink, DeviceError, DeviceSink};
pub use resample::{downmix_to_mono, remix_channels, resample_clip, ResampleError, ResampleQuality};

#[cfg(test)]
pub use decoder::MockDecoder;
#[cfg(test)]
pub use output::MockSink;
