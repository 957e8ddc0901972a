//! Clip selection: picks the next clip to play from a category.
//!
//! # Algorithm
//!
//! ```text
//! members ──▶ rebuild counts if membership changed
//!         ──▶ one member?  → return it
//!         ──▶ rank by ascending play count (stable)
//!         ──▶ draw uniformly from the bottom third, skipping last-played
//!         ──▶ record last-played, count += 1
//! ```
//!
//! The bottom-third window keeps play counts roughly level over time while
//! the draw inside the window keeps the order unpredictable.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use soundboard::library::Library;
//! use soundboard::selector::Selector;
//!
//! let library = Library::discover(Path::new("sounds")).unwrap();
//! let selector = Selector::new(library);
//!
//! let clip = selector.select_next("epic").unwrap();
//! println!("next up: {}", clip.display());
//! ```

pub mod window;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::library::{Category, Library, LibraryError};

pub use window::{draw, initial_window, rank_by_count};

// ---------------------------------------------------------------------------
// SelectError
// ---------------------------------------------------------------------------

/// Reasons a selection request can fail.  None of them alter selector state.
#[derive(Debug, Error)]
pub enum SelectError {
    /// No category is registered under this name or alias.
    #[error("unknown sound category {0:?}")]
    UnknownCategory(String),

    /// The category directory holds no playable files.
    #[error("sound category {0:?} is empty")]
    EmptyCategory(String),

    /// The category directory could not be listed.
    #[error(transparent)]
    Io(#[from] LibraryError),
}

// ---------------------------------------------------------------------------
// Selector
// ---------------------------------------------------------------------------

/// Per-category play counts and last-played clips, keyed by category
/// directory so that aliases share history with their category.
struct SelectorState {
    play_counts: HashMap<PathBuf, HashMap<PathBuf, u64>>,
    last_played: HashMap<PathBuf, PathBuf>,
    rng: StdRng,
}

/// Chooses clips so that the same clip never plays twice in a row and
/// rarely-played clips are preferred.
///
/// All tables sit behind one lock; selection is rare compared to playback.
pub struct Selector {
    library: Library,
    state: Mutex<SelectorState>,
}

impl Selector {
    /// Create a selector seeded from OS entropy.
    pub fn new(library: Library) -> Self {
        Self::with_rng(library, StdRng::from_entropy())
    }

    /// Create a selector with an explicit RNG (deterministic in tests).
    pub fn with_rng(library: Library, rng: StdRng) -> Self {
        Self {
            library,
            state: Mutex::new(SelectorState {
                play_counts: HashMap::new(),
                last_played: HashMap::new(),
                rng,
            }),
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Pick the next clip for the category registered as `name`.
    ///
    /// # Errors
    ///
    /// [`SelectError::UnknownCategory`] when `name` does not resolve,
    /// otherwise see [`Selector::select_in`].
    pub fn select_next(&self, name: &str) -> Result<PathBuf, SelectError> {
        let category = self
            .library
            .resolve(name)
            .ok_or_else(|| SelectError::UnknownCategory(name.to_string()))?;
        self.select_in(category)
    }

    /// Pick the next clip from `category`.
    ///
    /// # Errors
    ///
    /// [`SelectError::EmptyCategory`] when the directory has no files and
    /// [`SelectError::Io`] when it cannot be listed.
    pub fn select_in(&self, category: &Category) -> Result<PathBuf, SelectError> {
        // Directory I/O stays outside the lock.
        let members = category.members()?;
        if members.is_empty() {
            return Err(SelectError::EmptyCategory(category.name.clone()));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let counts = state
            .play_counts
            .entry(category.dir.clone())
            .or_default();
        if !same_members(counts, &members) {
            if !counts.is_empty() {
                log::debug!(
                    "membership of {:?} changed, resetting play counts",
                    category.name
                );
            }
            *counts = members.iter().map(|clip| (clip.clone(), 0)).collect();
        }

        let last = state.last_played.get(&category.dir).map(PathBuf::as_path);
        let ranked = rank_by_count(&members, counts);
        let chosen = draw(&ranked, last, &mut state.rng)
            .cloned()
            .ok_or_else(|| SelectError::EmptyCategory(category.name.clone()))?;

        *counts.entry(chosen.clone()).or_insert(0) += 1;
        state
            .last_played
            .insert(category.dir.clone(), chosen.clone());

        log::debug!(
            "selected {} from {:?} (plays: {})",
            chosen.display(),
            category.name,
            counts[&chosen]
        );
        Ok(chosen)
    }

    /// Current play counts for the category registered as `name`.
    ///
    /// `None` until the category has been selected from at least once.
    pub fn play_counts(&self, name: &str) -> Option<HashMap<PathBuf, u64>> {
        let category = self.library.resolve(name)?;
        self.state.lock().play_counts.get(&category.dir).cloned()
    }

    /// The clip most recently selected for the category registered as `name`.
    pub fn last_played(&self, name: &str) -> Option<PathBuf> {
        let category = self.library.resolve(name)?;
        self.state.lock().last_played.get(&category.dir).cloned()
    }
}

fn same_members(counts: &HashMap<PathBuf, u64>, members: &[PathBuf]) -> bool {
    counts.len() == members.len() && {
        let keys: HashSet<&Path> = counts.keys().map(PathBuf::as_path).collect();
        members.iter().all(|clip| keys.contains(clip.as_path()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    /// Create `sounds/e_epic/` holding the given clip files.
    fn make_library(files: &[&str]) -> (TempDir, Library) {
        let dir = tempdir().expect("temp dir");
        let epic = dir.path().join("e_epic");
        std::fs::create_dir(&epic).unwrap();
        for file in files {
            std::fs::write(epic.join(file), b"").unwrap();
        }
        let library = Library::discover(dir.path()).unwrap();
        (dir, library)
    }

    fn seeded(library: Library) -> Selector {
        Selector::with_rng(library, StdRng::seed_from_u64(0x5eed))
    }

    fn clip(dir: &TempDir, name: &str) -> PathBuf {
        dir.path().join("e_epic").join(name)
    }

    #[test]
    fn unknown_category_is_an_error() {
        let (_dir, library) = make_library(&["a.wav"]);
        let selector = seeded(library);
        assert!(matches!(
            selector.select_next("nope"),
            Err(SelectError::UnknownCategory(_))
        ));
    }

    #[test]
    fn empty_category_is_an_error_and_leaves_no_state() {
        let (_dir, library) = make_library(&[]);
        let selector = seeded(library);

        assert!(matches!(
            selector.select_next("epic"),
            Err(SelectError::EmptyCategory(_))
        ));
        assert!(selector.play_counts("epic").is_none());
        assert!(selector.last_played("epic").is_none());
    }

    #[test]
    fn single_member_is_always_returned() {
        let (dir, library) = make_library(&["only.wav"]);
        let selector = seeded(library);

        for _ in 0..5 {
            assert_eq!(selector.select_next("epic").unwrap(), clip(&dir, "only.wav"));
        }
        assert_eq!(selector.play_counts("epic").unwrap()[&clip(&dir, "only.wav")], 5);
    }

    #[test]
    fn never_repeats_back_to_back() {
        let layouts: [&[&str]; 3] = [
            &["a", "b"],
            &["a", "b", "c"],
            &["a", "b", "c", "d", "e", "f", "g"],
        ];
        for files in layouts {
            let (_dir, library) = make_library(files);
            let selector = seeded(library);

            let mut previous = selector.select_next("epic").unwrap();
            for _ in 0..300 {
                let next = selector.select_next("epic").unwrap();
                assert_ne!(next, previous, "repeat with {} members", files.len());
                previous = next;
            }
        }
    }

    #[test]
    fn three_clips_nine_selections_is_round_robin() {
        let (dir, library) = make_library(&["a.wav", "b.wav", "c.wav"]);
        let selector = seeded(library);

        // Window is 1 for three clips, so the least-played non-last clip
        // always wins and ties go to enumeration order.
        let first = selector.select_next("epic").unwrap();
        assert_eq!(first, clip(&dir, "a.wav"));
        assert_eq!(selector.play_counts("epic").unwrap()[&first], 1);

        for _ in 1..9 {
            selector.select_next("epic").unwrap();
        }

        let counts = selector.play_counts("epic").unwrap();
        for name in ["a.wav", "b.wav", "c.wav"] {
            assert_eq!(counts[&clip(&dir, name)], 3, "{name}");
        }
    }

    #[test]
    fn play_counts_stay_level() {
        let (_dir, library) = make_library(&["a", "b", "c", "d", "e"]);
        let selector = seeded(library);

        for _ in 0..1000 {
            selector.select_next("epic").unwrap();
        }

        let counts = selector.play_counts("epic").unwrap();
        let max = counts.values().max().unwrap();
        let min = counts.values().min().unwrap();
        assert_eq!(counts.values().sum::<u64>(), 1000);
        assert!(max - min <= 2, "spread {} too wide: {counts:?}", max - min);
    }

    #[test]
    fn adding_a_clip_resets_counts() {
        let (dir, library) = make_library(&["a", "b", "c"]);
        let selector = seeded(library);
        for _ in 0..6 {
            selector.select_next("epic").unwrap();
        }

        std::fs::write(clip(&dir, "d"), b"").unwrap();
        let picked = selector.select_next("epic").unwrap();

        let counts = selector.play_counts("epic").unwrap();
        assert_eq!(counts.len(), 4);
        assert_eq!(counts.values().sum::<u64>(), 1);
        assert_eq!(counts[&picked], 1);
    }

    #[test]
    fn removing_the_last_played_clip_is_tolerated() {
        let (dir, library) = make_library(&["a", "b", "c"]);
        let selector = seeded(library);

        let played = selector.select_next("epic").unwrap();
        std::fs::remove_file(&played).unwrap();

        let next = selector.select_next("epic").unwrap();
        assert_ne!(next, played);
        assert!(next.starts_with(dir.path()));

        let counts = selector.play_counts("epic").unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.values().sum::<u64>(), 1);
    }

    #[test]
    fn renaming_a_clip_rebuilds_the_table() {
        let (dir, library) = make_library(&["a", "b"]);
        let selector = seeded(library);
        selector.select_next("epic").unwrap();
        selector.select_next("epic").unwrap();

        std::fs::rename(clip(&dir, "a"), clip(&dir, "z")).unwrap();
        selector.select_next("epic").unwrap();

        let counts = selector.play_counts("epic").unwrap();
        assert!(counts.contains_key(&clip(&dir, "z")));
        assert!(!counts.contains_key(&clip(&dir, "a")));
        assert_eq!(counts.values().sum::<u64>(), 1);
    }

    #[test]
    fn aliases_share_history_with_their_category() {
        let (dir, mut library) = make_library(&["a", "b"]);
        library.merge_aliases([("epic".to_string(), vec!["wow".to_string()])].into());
        let selector = seeded(library);

        let first = selector.select_next("epic").unwrap();
        let second = selector.select_next("wow").unwrap();

        assert_ne!(first, second);
        assert_eq!(selector.last_played("epic"), Some(second));
        assert!(first.starts_with(dir.path()));
    }

    #[test]
    fn selector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Selector>();
    }
}
