//! Voice mixer fed to the output device.
//!
//! The [`Mixer`] is the state guarded by the device lock: the output
//! callback pulls from it, the playback controller adds and detaches voices
//! through it.  All voices must already match the device's rate and channel
//! count.
//!
//! A voice that runs out of samples is removed and its completion channel
//! fires `Ok(())`.  A voice that is detached is removed without firing; its
//! receiver observes the sender being dropped instead.

use tokio::sync::oneshot;

use super::DecodedClip;

/// Handle identifying one voice in a [`Mixer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

/// Resolves once the voice has played to the end.  Resolves with an error
/// when the voice was detached before reaching its end.
pub type VoiceCompletion = oneshot::Receiver<()>;

struct Voice {
    id: VoiceId,
    samples: Vec<f32>,
    /// Next sample index to play.
    cursor: usize,
    finished: Option<oneshot::Sender<()>>,
}

/// Sums any number of voices into the device buffer.
pub struct Mixer {
    channels: u16,
    voices: Vec<Voice>,
    next_id: u64,
}

impl Mixer {
    pub fn new(channels: u16) -> Self {
        Self {
            channels,
            voices: Vec::new(),
            next_id: 0,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Start playing `clip` alongside any existing voices.
    pub fn add(&mut self, clip: DecodedClip) -> (VoiceId, VoiceCompletion) {
        debug_assert_eq!(clip.channels, self.channels, "clip must be remixed first");

        self.next_id += 1;
        let id = VoiceId(self.next_id);
        let (tx, rx) = oneshot::channel();

        self.voices.push(Voice {
            id,
            samples: clip.samples,
            cursor: 0,
            finished: Some(tx),
        });
        (id, rx)
    }

    /// Remove a voice immediately.  Returns `false` if it had already ended
    /// or been detached.
    pub fn detach(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|voice| voice.id != id);
        self.voices.len() != before
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|voice| voice.id == id)
    }

    /// Playback position of a voice, in frames.
    pub fn position(&self, id: VoiceId) -> Option<usize> {
        self.voice(id)
            .map(|voice| voice.cursor / self.channels.max(1) as usize)
    }

    /// Total length of a voice, in frames.
    pub fn length(&self, id: VoiceId) -> Option<usize> {
        self.voice(id)
            .map(|voice| voice.samples.len() / self.channels.max(1) as usize)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice_ids(&self) -> Vec<VoiceId> {
        self.voices.iter().map(|voice| voice.id).collect()
    }

    /// Fill `out` (interleaved, `channels` wide) with the sum of all voices,
    /// clamped to `[-1.0, 1.0]`, and retire voices that ran out.
    pub fn fill(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        for voice in &mut self.voices {
            let remaining = &voice.samples[voice.cursor..];
            let n = remaining.len().min(out.len());
            for (dst, &src) in out[..n].iter_mut().zip(remaining) {
                *dst += src;
            }
            voice.cursor += n;
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.voices.retain_mut(|voice| {
            if voice.cursor < voice.samples.len() {
                return true;
            }
            if let Some(tx) = voice.finished.take() {
                // Nobody may be waiting any more; that is fine.
                let _ = tx.send(());
            }
            false
        });
    }

    fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|voice| voice.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
