//! The single foreground playback slot and its state machine.
//!
//! [`PlaybackSlot`] is only ever touched while the controller holds the
//! device lock, so its transitions are plain `&mut self` methods.  Each
//! transition that removes a voice hands the [`VoiceId`] back; the caller
//! detaches it from the mixer under the same lock.

use std::path::{Path, PathBuf};

use crate::audio::VoiceId;

// ---------------------------------------------------------------------------
// SlotState
// ---------------------------------------------------------------------------

/// States of the foreground slot.
///
/// ```text
/// Idle ──play──▶ Initializing ──device ready──▶ Playing
///      ──play (device already running)────────▶ Playing
/// Playing ──natural end──▶ Idle
/// Playing ──pause──▶ Paused
/// Paused ──play──▶ Initializing | Playing
/// any state ──replace──▶ old voice detached, new one attached
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// Nothing in the foreground.
    #[default]
    Idle,

    /// The device is being (re)opened for a pending clip.
    Initializing,

    /// A foreground voice is feeding the device.
    Playing,

    /// The foreground voice was detached by a pause; the device stays open.
    Paused,
}

impl SlotState {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::Initializing => "initializing",
            SlotState::Playing => "playing",
            SlotState::Paused => "paused",
        }
    }
}

// ---------------------------------------------------------------------------
// SlotSnapshot
// ---------------------------------------------------------------------------

/// Read-only copy of the slot, published to status subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotSnapshot {
    pub state: SlotState,
    /// Generation of the request that last claimed the slot (0 = none yet).
    pub generation: u64,
    /// Clip of the current (or paused) foreground voice.
    pub clip: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// PlaybackSlot
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct PlaybackSlot {
    state: SlotState,
    generation: u64,
    voice: Option<VoiceId>,
    clip: Option<PathBuf>,
}

impl PlaybackSlot {
    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a request of `generation` may still claim the slot.
    pub fn accepts(&self, generation: u64) -> bool {
        generation >= self.generation
    }

    /// Claim the slot while the device is opened for `generation`.
    ///
    /// Returns the foreground voice to detach, if any.
    pub fn begin_init(&mut self, generation: u64) -> Option<VoiceId> {
        self.generation = generation;
        self.state = SlotState::Initializing;
        self.voice.take()
    }

    /// Undo [`PlaybackSlot::begin_init`] after the device failed to open.
    ///
    /// `previous` is the state before the claim; a slot that was playing has
    /// lost its voice and falls back to idle.
    pub fn abort_init(&mut self, generation: u64, previous: SlotState) {
        if self.generation != generation || self.state != SlotState::Initializing {
            return;
        }
        self.state = match previous {
            SlotState::Playing | SlotState::Initializing => SlotState::Idle,
            other => other,
        };
        if self.state == SlotState::Idle {
            self.clip = None;
        }
    }

    /// Make `voice` the foreground voice for `generation`.
    ///
    /// Returns the voice it replaces, if any.
    pub fn attach(&mut self, generation: u64, voice: VoiceId, clip: &Path) -> Option<VoiceId> {
        debug_assert!(self.accepts(generation));
        self.generation = generation;
        self.state = SlotState::Playing;
        self.clip = Some(clip.to_path_buf());
        self.voice.replace(voice)
    }

    /// Playing → Paused.  Any other state is left alone.
    ///
    /// Returns the voice to detach when the slot was playing.
    pub fn pause(&mut self) -> Option<VoiceId> {
        if self.state != SlotState::Playing {
            return None;
        }
        self.state = SlotState::Paused;
        self.voice.take()
    }

    /// Clear the slot after `voice` of `generation` played to its end.
    ///
    /// Stale completions (another request has claimed the slot since) are
    /// ignored and return `false`.
    pub fn finish(&mut self, generation: u64, voice: VoiceId) -> bool {
        if self.generation != generation || self.voice != Some(voice) {
            return false;
        }
        self.state = SlotState::Idle;
        self.voice = None;
        self.clip = None;
        true
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            state: self.state,
            generation: self.generation,
            clip: self.clip.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DecodedClip, Mixer};

    /// Real voice ids come from a mixer.
    fn voices(n: usize) -> Vec<VoiceId> {
        let mut mixer = Mixer::new(1);
        (0..n)
            .map(|_| mixer.add(DecodedClip::new(vec![0.0], 1, 8_000)).0)
            .collect()
    }

    // ---- SlotState ---

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SlotState::default(), SlotState::Idle);
        assert_eq!(PlaybackSlot::default().snapshot(), SlotSnapshot::default());
    }

    #[test]
    fn labels() {
        assert_eq!(SlotState::Idle.label(), "idle");
        assert_eq!(SlotState::Initializing.label(), "initializing");
        assert_eq!(SlotState::Playing.label(), "playing");
        assert_eq!(SlotState::Paused.label(), "paused");
    }

    // ---- attach / finish ---

    #[test]
    fn attach_then_natural_end_returns_to_idle() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();

        assert_eq!(slot.attach(1, v[0], Path::new("a.wav")), None);
        assert_eq!(slot.state(), SlotState::Playing);
        assert_eq!(slot.snapshot().clip.as_deref(), Some(Path::new("a.wav")));

        assert!(slot.finish(1, v[0]));
        assert_eq!(slot.state(), SlotState::Idle);
        assert_eq!(slot.snapshot().clip, None);
    }

    #[test]
    fn attach_returns_replaced_voice() {
        let v = voices(2);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));
        assert_eq!(slot.attach(2, v[1], Path::new("b.wav")), Some(v[0]));
        assert_eq!(slot.generation(), 2);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let v = voices(2);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));
        slot.attach(2, v[1], Path::new("b.wav"));

        assert!(!slot.finish(1, v[0]));
        assert_eq!(slot.state(), SlotState::Playing);
    }

    #[test]
    fn older_generation_is_not_accepted() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();
        slot.attach(5, v[0], Path::new("a.wav"));
        assert!(!slot.accepts(4));
        assert!(slot.accepts(5));
        assert!(slot.accepts(6));
    }

    // ---- pause ---

    #[test]
    fn pause_detaches_and_is_idempotent() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));

        assert_eq!(slot.pause(), Some(v[0]));
        assert_eq!(slot.state(), SlotState::Paused);
        assert_eq!(slot.pause(), None);
        assert_eq!(slot.state(), SlotState::Paused);
    }

    #[test]
    fn pause_when_idle_or_initializing_is_a_noop() {
        let mut slot = PlaybackSlot::default();
        assert_eq!(slot.pause(), None);
        assert_eq!(slot.state(), SlotState::Idle);

        slot.begin_init(1);
        assert_eq!(slot.pause(), None);
        assert_eq!(slot.state(), SlotState::Initializing);
    }

    #[test]
    fn paused_voice_does_not_clear_slot_on_completion() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));
        slot.pause();
        assert!(!slot.finish(1, v[0]));
        assert_eq!(slot.state(), SlotState::Paused);
    }

    // ---- begin_init / abort_init ---

    #[test]
    fn begin_init_takes_the_foreground_voice() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));

        assert_eq!(slot.begin_init(2), Some(v[0]));
        assert_eq!(slot.state(), SlotState::Initializing);
    }

    #[test]
    fn abort_init_restores_idle_or_paused() {
        let mut slot = PlaybackSlot::default();
        slot.begin_init(1);
        slot.abort_init(1, SlotState::Idle);
        assert_eq!(slot.state(), SlotState::Idle);

        let v = voices(1);
        slot.attach(2, v[0], Path::new("a.wav"));
        slot.pause();
        slot.begin_init(3);
        slot.abort_init(3, SlotState::Paused);
        assert_eq!(slot.state(), SlotState::Paused);
    }

    #[test]
    fn abort_init_after_losing_the_voice_goes_idle() {
        let v = voices(1);
        let mut slot = PlaybackSlot::default();
        slot.attach(1, v[0], Path::new("a.wav"));
        slot.begin_init(2);
        slot.abort_init(2, SlotState::Playing);
        assert_eq!(slot.state(), SlotState::Idle);
        assert_eq!(slot.snapshot().clip, None);
    }
}
