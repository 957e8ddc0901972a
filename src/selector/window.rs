//! Ranking and windowed random draw used by [`crate::selector::Selector`].
//!
//! Clips are ranked by ascending play count.  The *selection window* is the
//! rarely-played third of the ranking (at least one clip).  A candidate is
//! drawn uniformly from the window, excluding the last-played clip; when the
//! window holds nothing but the last-played clip it grows by one, so the loop
//! runs at most `ranked.len()` times.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Rank `members` by ascending play count.
///
/// The sort is stable, so equal counts keep enumeration order.  Members
/// missing from `counts` rank as zero.
pub fn rank_by_count<'a>(
    members: &'a [PathBuf],
    counts: &HashMap<PathBuf, u64>,
) -> Vec<&'a PathBuf> {
    let mut ranked: Vec<&PathBuf> = members.iter().collect();
    ranked.sort_by_key(|clip| counts.get(*clip).copied().unwrap_or(0));
    ranked
}

/// Initial selection window for a ranking of `len` clips: `max(1, len / 3)`.
pub fn initial_window(len: usize) -> usize {
    (len / 3).max(1)
}

/// Draw the next clip from `ranked`, never returning `last` when any other
/// clip exists.
///
/// Returns `None` only when `ranked` is empty.
pub fn draw<'a, R: Rng + ?Sized>(
    ranked: &[&'a PathBuf],
    last: Option<&Path>,
    rng: &mut R,
) -> Option<&'a PathBuf> {
    match ranked {
        [] => None,
        [only] => Some(*only),
        _ => {
            let mut window = initial_window(ranked.len());
            loop {
                let eligible: Vec<&PathBuf> = ranked[..window]
                    .iter()
                    .copied()
                    .filter(|clip| Some(clip.as_path()) != last)
                    .collect();

                if !eligible.is_empty() {
                    return Some(eligible[rng.gen_range(0..eligible.len())]);
                }

                // `last` occupies the whole window; with two or more clips
                // the full ranking always holds another one.
                window += 1;
                debug_assert!(window <= ranked.len());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
