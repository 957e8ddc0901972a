//! Soundboard: plays a clip from a named category whenever a trigger fires.
//!
//! # Architecture
//!
//! ```text
//! rdev hotkeys ─▶ HotkeyEvent (mpsc) ─▶ TriggerDispatcher
//!                                          │
//!                     Library ─▶ Selector::select_next(name)
//!                                          │
//!                                          ▼
//!                      PlaybackController::play(clip, Replace | Overlay)
//!                                          │
//!                     Decoder ─▶ resample / remix ─▶ Mixer ─▶ cpal
//! ```
//!
//! * [`library`]: category directories, shortcuts and aliases.
//! * [`selector`]: least-played-third random selection, never repeating.
//! * [`playback`]: single foreground slot with replace, overlay and pause.
//! * [`audio`]: decoding, resampling, mixing and the output device.
//! * [`hotkey`]: global chord bindings.
//! * [`dispatch`]: wires triggers to selection and playback.
//! * [`config`]: TOML settings.

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod hotkey;
pub mod library;
pub mod playback;
pub mod selector;
