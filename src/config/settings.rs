//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`.
//! Every table is `#[serde(default)]`, so a config file only needs the keys
//! it wants to change.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::ResampleQuality;
use crate::playback::{PlaybackOptions, RateStrategy};

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// How clips are fitted to the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// `Resample` keeps the device rate; `Reinitialize` reopens the device
    /// at each clip's native rate.
    pub rate_strategy: RateStrategy,
    pub resample_quality: ResampleQuality,
}

impl From<PlaybackConfig> for PlaybackOptions {
    fn from(config: PlaybackConfig) -> Self {
        Self {
            rate_strategy: config.rate_strategy,
            resample_quality: config.resample_quality,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Skip the `<modifier>+<letter>` binding generated for every category.
    pub disable_category_shortcuts: bool,
    /// Modifier held together with a category's shortcut letter.
    pub category_modifier: String,
    /// Chord that pauses the foreground clip (e.g. `"Alt+Space"`).
    pub pause: String,
    /// Chord that quits the program.
    pub quit: String,
    /// Categories played on top of the foreground clip instead of replacing
    /// it.
    pub overlay_categories: Vec<String>,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            disable_category_shortcuts: false,
            category_modifier: "Alt".into(),
            pause: "Alt+Space".into(),
            quit: "Shift+Alt+Q".into(),
            overlay_categories: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `config.toml`.
///
/// ```toml
/// sounds_dir = "sounds"
/// startup_sound = "startup.wav"
///
/// [playback]
/// rate_strategy = "Resample"
/// resample_quality = "Medium"
///
/// [hotkey]
/// category_modifier = "Alt"
/// overlay_categories = ["airhorn"]
/// ```
///
/// # Loading
///
/// ```rust,no_run
/// use soundboard::config::AppConfig;
///
/// // Returns Default when no file exists
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding one sub-directory per category.
    pub sounds_dir: PathBuf,
    /// Clip played once at startup, relative to `sounds_dir`.
    pub startup_sound: PathBuf,
    pub playback: PlaybackConfig,
    pub hotkey: HotkeyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sounds_dir: PathBuf::from("sounds"),
            startup_sound: PathBuf::from("startup.wav"),
            playback: PlaybackConfig::default(),
            hotkey: HotkeyConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `./config.toml` if present, otherwise from
    /// the platform config directory.
    ///
    /// Returns `Ok(AppConfig::default())` when neither file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(AppPaths::new().resolve_settings())
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories as
    /// needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Full path of the startup sound.
    pub fn startup_sound_path(&self) -> PathBuf {
        self.sounds_dir.join(&self.startup_sound)
    }

    pub fn playback_options(&self) -> PlaybackOptions {
        self.playback.into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
