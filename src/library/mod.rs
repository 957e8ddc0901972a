//! Sound library: discovers categories in the sounds directory.
//!
//! # Layout
//!
//! ```text
//! sounds/
//! ├── startup.wav
//! ├── aliases.json        (optional)
//! ├── e_epic/             → category "epic", shortcut Alt+E
//! │   ├── fanfare.wav
//! │   └── horns.mp3
//! └── s_secret_/          → private category "secret_", shortcut Alt+S
//!     └── shh.flac
//! ```
//!
//! [`Library::discover`] runs once at startup.  Category *membership* is not
//! cached: [`Category::members`] re-reads the directory on every call so
//! clips can be added or removed while the soundboard is running.

pub mod aliases;
pub mod category;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use aliases::{read_aliases, AliasMap, ALIAS_FILE_NAME};
pub use category::Category;

// ---------------------------------------------------------------------------
// LibraryError
// ---------------------------------------------------------------------------

/// Errors raised while reading the sounds directory.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed alias file {path}: {source}")]
    Aliases {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// All categories found in the sounds directory, plus their aliases.
#[derive(Debug, Clone, Default)]
pub struct Library {
    categories: Vec<Category>,
    /// Lowercase trigger name (category name or alias) → index in `categories`.
    names: BTreeMap<String, usize>,
}

impl Library {
    /// Scan `sounds_dir` for category directories and merge `aliases.json`.
    ///
    /// # Errors
    ///
    /// Fails when the sounds directory cannot be read or the alias file is
    /// malformed.  Aliases pointing to unknown categories and duplicate
    /// aliases are skipped with a warning.
    pub fn discover(sounds_dir: &Path) -> Result<Self, LibraryError> {
        let io_err = |source| LibraryError::Io {
            path: sounds_dir.to_path_buf(),
            source,
        };

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(sounds_dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut library = Self::from_categories(dirs.into_iter().filter_map(Category::from_dir));
        library.merge_aliases(read_aliases(sounds_dir)?);

        log::info!(
            "discovered {} sound categories in {}",
            library.categories.len(),
            sounds_dir.display()
        );
        Ok(library)
    }

    /// Build a library from already-constructed categories.
    ///
    /// When two categories share a name, the first one wins.
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut library = Self::default();
        for category in categories {
            if library.names.contains_key(&category.name) {
                log::warn!(
                    "duplicate category name {:?} ({}), skipping",
                    category.name,
                    category.dir.display()
                );
                continue;
            }
            library
                .names
                .insert(category.name.clone(), library.categories.len());
            library.categories.push(category);
        }
        library
    }

    /// Register `aliases` as extra names for existing categories.
    pub fn merge_aliases(&mut self, aliases: AliasMap) {
        for (target, names) in aliases {
            let Some(&index) = self.names.get(&target.to_lowercase()) else {
                log::warn!("aliases configured for unknown sound category {target:?}, skipping");
                continue;
            };

            for alias in names {
                let alias = alias.to_lowercase();
                if self.names.contains_key(&alias) {
                    log::warn!("duplicate alias {alias:?}, skipping");
                    continue;
                }
                self.names.insert(alias, index);
            }
        }
    }

    /// Resolve a trigger name (case-insensitive) to its category.
    pub fn resolve(&self, name: &str) -> Option<&Category> {
        self.names
            .get(&name.to_lowercase())
            .map(|&index| &self.categories[index])
    }

    /// All categories in discovery order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Names of non-private categories (aliases excluded), for help listings.
    pub fn public_names(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|c| !c.private)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
