//! A single sound category backed by a directory on disk.

use std::path::{Path, PathBuf};

use super::LibraryError;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A named collection of clips, backed by one directory.
///
/// Membership is re-read from disk on every call to [`Category::members`];
/// files may be added or removed while the program runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Lowercase name used by triggers (e.g. `"epic"`).
    pub name: String,
    /// Directory holding the clips.
    pub dir: PathBuf,
    /// Hotkey shortcut character, uppercase (e.g. `'E'`).
    pub shortcut: Option<char>,
    /// Private categories (directory name ending in `_`) are not advertised
    /// in [`crate::library::Library::public_names`].
    pub private: bool,
}

impl Category {
    /// Build a category from its directory, deriving the name and shortcut
    /// from the directory name.
    ///
    /// | Directory   | Name      | Shortcut | Private |
    /// |-------------|-----------|----------|---------|
    /// | `e_epic`    | `epic`    | `E`      | no      |
    /// | `Horns`     | `horns`   | `H`      | no      |
    /// | `s_secret_` | `secret_` | `S`      | yes     |
    pub fn from_dir(dir: impl Into<PathBuf>) -> Option<Self> {
        let dir = dir.into();
        let dir_name = dir.file_name()?.to_str()?.to_string();
        let (shortcut, name) = split_shortcut(&dir_name)?;

        Some(Self {
            name: name.to_lowercase(),
            shortcut: shortcut.is_ascii_alphanumeric().then(|| shortcut.to_ascii_uppercase()),
            private: dir_name.ends_with('_'),
            dir,
        })
    }

    /// List the current members of this category.
    ///
    /// Only regular, non-hidden files are returned.  The result is sorted by
    /// file name so that enumeration order is stable between calls.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::Io`] when the directory cannot be read.
    pub fn members(&self) -> Result<Vec<PathBuf>, LibraryError> {
        list_clips(&self.dir)
    }
}

/// Split `x_name` into `('x', "name")`.  Names without a one-character
/// shortcut prefix use their first character as the shortcut.
fn split_shortcut(dir_name: &str) -> Option<(char, &str)> {
    let mut chars = dir_name.chars();
    let first = chars.next()?;
    let rest = chars.as_str();

    match rest.chars().next() {
        Some('_' | '-' | '.' | ' ') if rest.len() > 1 => Some((first, &rest[1..])),
        _ => Some((first, dir_name)),
    }
}

fn list_clips(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let io_err = |source| LibraryError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut clips = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
        if is_hidden || !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        clips.push(entry.path());
    }

    clips.sort();
    Ok(clips)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn shortcut_prefix_is_stripped() {
        let cat = Category::from_dir("/sounds/e_Epic").unwrap();
        assert_eq!(cat.name, "epic");
        assert_eq!(cat.shortcut, Some('E'));
        assert!(!cat.private);
    }

    #[test]
    fn plain_name_uses_first_letter() {
        let cat = Category::from_dir("/sounds/horns").unwrap();
        assert_eq!(cat.name, "horns");
        assert_eq!(cat.shortcut, Some('H'));
    }

    #[test]
    fn trailing_underscore_marks_private() {
        let cat = Category::from_dir("/sounds/s_secret_").unwrap();
        assert_eq!(cat.name, "secret_");
        assert!(cat.private);
    }

    #[test]
    fn single_char_dir_keeps_its_name() {
        let cat = Category::from_dir("/sounds/x_").unwrap();
        assert_eq!(cat.name, "x_");
        assert_eq!(cat.shortcut, Some('X'));
    }

    #[test]
    fn members_skip_dirs_and_hidden_files() {
        let dir = tempdir().expect("temp dir");
        std::fs::write(dir.path().join("b.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let cat = Category::from_dir(dir.path()).unwrap();
        let members = cat.members().unwrap();

        assert_eq!(
            members,
            vec![dir.path().join("a.wav"), dir.path().join("b.wav")]
        );
    }

    #[test]
    fn members_of_missing_dir_is_io_error() {
        let cat = Category::from_dir("/definitely/not/here_x").unwrap();
        assert!(matches!(cat.members(), Err(LibraryError::Io { .. })));
    }
}
