//! Sample-rate conversion and channel mixing for decoded clips.
//!
//! Every voice in the [`crate::audio::Mixer`] must match the output device,
//! so clips go through two steps before playback:
//!
//! 1. [`resample_clip`]: convert to the device rate with rubato's
//!    `SincFixedIn` at a fixed [`ResampleQuality`].
//! 2. [`remix_channels`]: up-mix or down-mix to the device channel count.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DecodedClip;

/// Frames fed to the resampler per call.
const CHUNK_FRAMES: usize = 1024;

// ---------------------------------------------------------------------------
// ResampleQuality
// ---------------------------------------------------------------------------

/// Sinc interpolation presets, trading CPU time for fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleQuality {
    Quick,
    #[default]
    Medium,
    High,
}

impl ResampleQuality {
    fn parameters(self) -> SincInterpolationParameters {
        let (sinc_len, oversampling_factor) = match self {
            Self::Quick => (64, 64),
            Self::Medium => (128, 128),
            Self::High => (256, 256),
        };
        SincInterpolationParameters {
            sinc_len,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor,
            window: WindowFunction::BlackmanHarris2,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("failed to build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// resample_clip
// ---------------------------------------------------------------------------

/// Convert `clip` to `target_rate` Hz.
///
/// The output holds `ceil(frames * target_rate / source_rate)` frames; the
/// resampler's latency is trimmed from the front and its tail flushed, so
/// the clip is neither shifted nor cut short.  A clip already at
/// `target_rate` is returned unchanged.
pub fn resample_clip(
    clip: &DecodedClip,
    target_rate: u32,
    quality: ResampleQuality,
) -> Result<DecodedClip, ResampleError> {
    if clip.sample_rate == target_rate {
        return Ok(clip.clone());
    }

    let channels = clip.channels as usize;
    let frames = clip.frames();
    if frames == 0 || channels == 0 || clip.sample_rate == 0 {
        return Ok(DecodedClip::new(Vec::new(), clip.channels, target_rate));
    }

    let ratio = target_rate as f64 / clip.sample_rate as f64;
    let expected = (frames as f64 * ratio).ceil() as usize;

    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 1.0, quality.parameters(), CHUNK_FRAMES, channels)?;
    let delay = resampler.output_delay();

    let planar = deinterleave(&clip.samples, channels);
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut pos = 0;
    while pos + CHUNK_FRAMES <= frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + CHUNK_FRAMES]).collect();
        append(&mut output, resampler.process(&chunk, None)?);
        pos += CHUNK_FRAMES;
    }
    if pos < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..]).collect();
        append(&mut output, resampler.process_partial(Some(chunk.as_slice()), None)?);
    }

    // Flush the filter tail.
    while output[0].len() < delay + expected {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail.first().map_or(true, Vec::is_empty) {
            break;
        }
        append(&mut output, tail);
    }

    for ch in &mut output {
        ch.drain(..delay.min(ch.len()));
        ch.resize(expected, 0.0);
    }

    Ok(DecodedClip::new(
        interleave(&output),
        clip.channels,
        target_rate,
    ))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &s) in planar.iter_mut().zip(frame) {
            ch.push(s);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for ch in planar {
            out.push(ch[frame]);
        }
    }
    out
}

fn append(output: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
    for (out, ch) in output.iter_mut().zip(chunk) {
        out.extend_from_slice(&ch);
    }
}

// ---------------------------------------------------------------------------
// Channel mixing
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// * `channels == 1` returns the input as an owned `Vec`.
/// * `channels == 0` returns an empty vector.
///
/// ```rust
/// use soundboard::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Adapt `clip` to `target` channels.
///
/// Mono is copied to every output channel; wider layouts map channel `i` to
/// `i` and fill missing channels from the mono mix.  Down-mixing to mono
/// averages, down-mixing to other widths keeps the leading channels.
pub fn remix_channels(clip: DecodedClip, target: u16) -> DecodedClip {
    if clip.channels == target || target == 0 || clip.channels == 0 {
        return clip;
    }

    let source = clip.channels as usize;
    let width = target as usize;
    let samples = if target == 1 {
        downmix_to_mono(&clip.samples, clip.channels)
    } else {
        let mut out = Vec::with_capacity(clip.frames() * width);
        for frame in clip.samples.chunks_exact(source) {
            let mono = frame.iter().sum::<f32>() / source as f32;
            for ch in 0..width {
                out.push(match source {
                    1 => frame[0],
                    _ => frame.get(ch).copied().unwrap_or(mono),
                });
            }
        }
        out
    };

    DecodedClip::new(samples, target, clip.sample_rate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_clip(value: f32, frames: usize, channels: u16, rate: u32) -> DecodedClip {
        DecodedClip::new(vec![value; frames * channels as usize], channels, rate)
    }

    #[test]
    fn same_rate_is_noop() {
        let clip = constant_clip(0.1, 160, 2, 48_000);
        let out = resample_clip(&clip, 48_000, ResampleQuality::Quick).unwrap();
        assert_eq!(out, clip);
    }

    #[test]
    fn empty_clip_only_changes_rate() {
        let clip = DecodedClip::new(Vec::new(), 2, 44_100);
        let out = resample_clip(&clip, 48_000, ResampleQuality::Quick).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.sample_rate, 48_000);
    }

    #[test]
    fn upsample_44100_to_48000_length() {
        let clip = constant_clip(0.0, 4_410, 2, 44_100);
        let out = resample_clip(&clip, 48_000, ResampleQuality::Medium).unwrap();
        assert_eq!(out.sample_rate, 48_000);
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 4_800);
    }

    #[test]
    fn downsample_48000_to_16000_length() {
        let clip = constant_clip(0.0, 4_800, 1, 48_000);
        let out = resample_clip(&clip, 16_000, ResampleQuality::Quick).unwrap();
        assert_eq!(out.frames(), 1_600);
    }

    #[test]
    fn constant_signal_keeps_amplitude_in_the_middle() {
        let clip = constant_clip(0.5, 8_000, 1, 8_000);
        let out = resample_clip(&clip, 16_000, ResampleQuality::High).unwrap();
        assert_eq!(out.frames(), 16_000);

        // Edges ramp in and out through the filter; the body must be flat.
        for &s in &out.samples[2_000..14_000] {
            assert!((s - 0.5).abs() < 0.02, "amplitude drift: {s}");
        }
    }

    #[test]
    fn downmix_averages_channels() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = downmix_to_mono(&input, 2);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_to_mono(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        let clip = DecodedClip::new(vec![0.1, 0.2], 1, 44_100);
        let out = remix_channels(clip, 2);
        assert_eq!(out.channels, 2);
        assert_eq!(out.samples, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn remix_stereo_to_mono_averages() {
        let clip = DecodedClip::new(vec![0.2, 0.4], 2, 44_100);
        let out = remix_channels(clip, 1);
        assert_eq!(out.channels, 1);
        assert!((out.samples[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn remix_stereo_to_quad_fills_from_mono_mix() {
        let clip = DecodedClip::new(vec![0.2, 0.4], 2, 44_100);
        let out = remix_channels(clip, 4);
        assert_eq!(out.frames(), 1);
        assert_eq!(out.samples[..2], [0.2, 0.4]);
        assert!((out.samples[2] - 0.3).abs() < 1e-6);
        assert!((out.samples[3] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn remix_same_width_is_untouched() {
        let clip = DecodedClip::new(vec![0.2, 0.4], 2, 44_100);
        assert_eq!(remix_channels(clip.clone(), 2), clip);
    }
}
