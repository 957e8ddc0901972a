//! Cross-platform application paths using the `dirs` crate.
//!
//! Config lookup order:
//!
//!   1. `./config.toml` in the working directory
//!   2. the platform config dir:
//!        Windows: %APPDATA%\soundboard\config.toml
//!        macOS:   ~/Library/Application Support/soundboard/config.toml
//!        Linux:   ~/.config/soundboard/config.toml

use std::path::{Path, PathBuf};

/// File name of the settings file in every location.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Platform directory for `config.toml`.
    pub config_dir: PathBuf,
    /// `config.toml` inside [`AppPaths::config_dir`].
    pub settings_file: PathBuf,
    /// `config.toml` in the working directory; preferred when present.
    pub local_settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "soundboard";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join(CONFIG_FILE_NAME),
            local_settings_file: PathBuf::from(CONFIG_FILE_NAME),
            config_dir,
        }
    }

    /// The settings file to read: the local one if it exists, otherwise the
    /// platform one (which may not exist either).
    pub fn resolve_settings(&self) -> &Path {
        if self.local_settings_file.is_file() {
            &self.local_settings_file
        } else {
            &self.settings_file
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.config_dir.ends_with("soundboard"));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "config.toml"));
    }

    #[test]
    fn local_file_wins_when_present() {
        let dir = tempdir().expect("temp dir");
        let local = dir.path().join(CONFIG_FILE_NAME);
        let mut paths = AppPaths::new();
        paths.local_settings_file = local.clone();

        assert_eq!(paths.resolve_settings(), paths.settings_file.as_path());

        std::fs::write(&local, "").unwrap();
        assert_eq!(paths.resolve_settings(), local.as_path());
    }
}
