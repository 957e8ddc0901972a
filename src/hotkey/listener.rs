//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will remain
//! blocked in the rdev event loop until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{Binding, HotkeyEvent, Modifiers};

// ---------------------------------------------------------------------------
// HotkeyMatcher
// ---------------------------------------------------------------------------

/// Turns a stream of raw key events into [`HotkeyEvent`]s.
///
/// A chord fires when its key goes down while exactly its modifiers are
/// held.  Auto-repeat presses of a key that is already down are ignored.
#[derive(Debug)]
pub struct HotkeyMatcher {
    bindings: Vec<Binding>,
    held: Modifiers,
    /// Non-modifier keys currently down.
    down: Vec<rdev::Key>,
}

impl HotkeyMatcher {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            held: Modifiers::NONE,
            down: Vec::new(),
        }
    }

    /// Feed one event; returns the hotkey it completes, if any.
    pub fn handle(&mut self, event: &rdev::EventType) -> Option<HotkeyEvent> {
        match *event {
            rdev::EventType::KeyPress(key) => {
                if self.held.update(key, true) || self.down.contains(&key) {
                    return None;
                }
                self.down.push(key);
                self.bindings
                    .iter()
                    .find(|b| b.chord.key == key && b.chord.modifiers == self.held)
                    .map(|b| b.event.clone())
            }
            rdev::EventType::KeyRelease(key) => {
                if !self.held.update(key, false) {
                    self.down.retain(|k| *k != key);
                }
                None
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.
///
/// Construct one with [`HotkeyListener::start`].  Drop it to stop forwarding
/// events.
pub struct HotkeyListener {
    /// Shared stop flag: set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// Never joined; `rdev::listen` does not return.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn a dedicated OS thread that listens for global key events and
    /// forwards every matched binding on `tx`.
    ///
    /// The background thread uses `blocking_send`, so `tx` works from a
    /// non-async context.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses to create the thread.
    pub fn start(bindings: Vec<Binding>, tx: mpsc::Sender<HotkeyEvent>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        for binding in &bindings {
            log::info!("hotkey {} → {:?}", binding.chord, binding.event);
        }
        let mut matcher = HotkeyMatcher::new(bindings);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }
                    if let Some(hotkey) = matcher.handle(&event.event_type) {
                        log::debug!("hotkey fired: {hotkey:?}");
                        // blocking_send is safe to call from non-async threads.
                        let _ = tx.blocking_send(hotkey);
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                }
            })?;

        Ok(Self {
            stop,
            _thread: thread,
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
