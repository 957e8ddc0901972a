//! Configuration module for the soundboard.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for playback and
//! hotkeys, `AppPaths` for cross-platform config locations, and TOML
//! persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, CONFIG_FILE_NAME};
pub use settings::{AppConfig, HotkeyConfig, PlaybackConfig};
