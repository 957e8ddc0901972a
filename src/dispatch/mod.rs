//! Trigger dispatcher: turns [`HotkeyEvent`]s into selections and playback.
//!
//! # Flow
//!
//! ```text
//! HotkeyEvent::PlayCategory(name)
//!   └─▶ Selector::select_next(name)
//!         ├─ Ok(clip) → PlaybackController::play(clip, Overlay | Replace)
//!         └─ Err      → warn, keep running
//!
//! HotkeyEvent::Pause → PlaybackController::pause()
//! HotkeyEvent::Quit  → return from run()
//! ```
//!
//! Playback runs on its own tasks, so the loop is never blocked by a clip.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::hotkey::HotkeyEvent;
use crate::playback::{PlayMode, PlayRequest, PlaybackController};
use crate::selector::Selector;

/// Why [`TriggerDispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    /// A [`HotkeyEvent::Quit`] was received.
    Quit,
    /// Every sender was dropped.
    Closed,
}

/// Routes triggers to the selector and the playback controller.
pub struct TriggerDispatcher {
    selector: Arc<Selector>,
    controller: PlaybackController,
    /// Lowercase names (category or alias) played as overlays.
    overlay: HashSet<String>,
}

impl TriggerDispatcher {
    pub fn new(
        selector: Arc<Selector>,
        controller: PlaybackController,
        overlay_categories: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            selector,
            controller,
            overlay: overlay_categories
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }

    /// Handle events until `Quit` arrives or the channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<HotkeyEvent>) -> DispatchExit {
        while let Some(event) = rx.recv().await {
            match event {
                HotkeyEvent::PlayCategory(name) => {
                    // Fire and forget; failures are logged by the controller.
                    let _ = self.trigger(&name);
                }
                HotkeyEvent::Pause => {
                    self.controller.pause();
                }
                HotkeyEvent::Quit => {
                    log::info!("dispatch: quit requested");
                    return DispatchExit::Quit;
                }
            }
        }

        log::info!("dispatch: trigger channel closed, shutting down");
        DispatchExit::Closed
    }

    /// Select the next clip of `name` and submit it for playback.
    ///
    /// Returns `None` (after logging) when nothing could be selected.
    pub fn trigger(&self, name: &str) -> Option<PlayRequest> {
        let clip = match self.selector.select_next(name) {
            Ok(clip) => clip,
            Err(e) => {
                log::warn!("dispatch: {e}");
                return None;
            }
        };

        let mode = self.mode_for(name);
        log::info!("dispatch: {name} → {} ({mode:?})", clip.display());
        Some(self.controller.play(clip, mode))
    }

    fn mode_for(&self, name: &str) -> PlayMode {
        let overlay = self.overlay.contains(&name.to_lowercase())
            || self
                .selector
                .library()
                .resolve(name)
                .is_some_and(|category| self.overlay.contains(&category.name));
        if overlay {
            PlayMode::Overlay
        } else {
            PlayMode::Replace
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
