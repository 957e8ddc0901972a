//! Global hotkeys, backed by `rdev`.
//!
//! # Design
//!
//! `rdev::listen()` is a blocking OS-level call that never returns while the
//! process is alive.  It runs on a **dedicated OS thread** owned by
//! [`HotkeyListener`]; a [`HotkeyMatcher`] on that thread tracks which
//! modifiers are held and turns key presses into [`HotkeyEvent`]s.
//!
//! Bindings come from [`build_bindings`]:
//!
//! | Chord                          | Event                   |
//! |--------------------------------|-------------------------|
//! | `hotkey.quit` (`Shift+Alt+Q`)  | [`HotkeyEvent::Quit`]   |
//! | `hotkey.pause` (`Alt+Space`)   | [`HotkeyEvent::Pause`]  |
//! | `<modifier>+<shortcut letter>` | [`HotkeyEvent::PlayCategory`] per category |
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tokio::sync::mpsc;
//! use soundboard::config::HotkeyConfig;
//! use soundboard::hotkey::{build_bindings, HotkeyListener};
//! use soundboard::library::Library;
//!
//! let library = Library::discover(Path::new("sounds")).unwrap();
//! let bindings = build_bindings(&library, &HotkeyConfig::default()).unwrap();
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let _listener = HotkeyListener::start(bindings, tx).unwrap();
//!
//! // In your async loop:
//! // while let Some(ev) = rx.recv().await { ... }
//! ```

pub mod listener;

use std::fmt;

use thiserror::Error;

use crate::config::HotkeyConfig;
use crate::library::Library;

pub use listener::{HotkeyListener, HotkeyMatcher};

// ---------------------------------------------------------------------------
// HotkeyEvent
// ---------------------------------------------------------------------------

/// Events emitted by the hotkey listener thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// Play the next clip of the named category.
    PlayCategory(String),
    /// Pause the foreground clip.
    Pause,
    /// Shut the program down.
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("empty hotkey")]
    Empty,

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("unknown modifier {0:?}")]
    UnknownModifier(String),
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a hotkey name from a config string into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys, digits, and single uppercase or
/// lowercase ASCII letters.
///
/// Returns `None` for unrecognised names so callers can fall back to a default
/// or display an error to the user.
///
/// # Examples
///
/// ```
/// use soundboard::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"),      Some(rdev::Key::F9));
/// assert_eq!(parse_key("Space"),   Some(rdev::Key::Space));
/// assert_eq!(parse_key("a"),       Some(rdev::Key::KeyA));
/// assert_eq!(parse_key("7"),       Some(rdev::Key::Num7));
/// assert_eq!(parse_key("xyz"),     None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    match key_str {
        // Function keys
        "F1" => Some(rdev::Key::F1),
        "F2" => Some(rdev::Key::F2),
        "F3" => Some(rdev::Key::F3),
        "F4" => Some(rdev::Key::F4),
        "F5" => Some(rdev::Key::F5),
        "F6" => Some(rdev::Key::F6),
        "F7" => Some(rdev::Key::F7),
        "F8" => Some(rdev::Key::F8),
        "F9" => Some(rdev::Key::F9),
        "F10" => Some(rdev::Key::F10),
        "F11" => Some(rdev::Key::F11),
        "F12" => Some(rdev::Key::F12),

        // Navigation / control
        "Escape" | "Esc" => Some(rdev::Key::Escape),
        "Space" => Some(rdev::Key::Space),
        "Return" | "Enter" => Some(rdev::Key::Return),
        "Tab" => Some(rdev::Key::Tab),
        "Backspace" => Some(rdev::Key::Backspace),
        "Delete" | "Del" => Some(rdev::Key::Delete),
        "Home" => Some(rdev::Key::Home),
        "End" => Some(rdev::Key::End),
        "PageUp" => Some(rdev::Key::PageUp),
        "PageDown" => Some(rdev::Key::PageDown),
        "UpArrow" | "Up" => Some(rdev::Key::UpArrow),
        "DownArrow" | "Down" => Some(rdev::Key::DownArrow),
        "LeftArrow" | "Left" => Some(rdev::Key::LeftArrow),
        "RightArrow" | "Right" => Some(rdev::Key::RightArrow),
        "Pause" => Some(rdev::Key::Pause),

        // Digits
        "0" => Some(rdev::Key::Num0),
        "1" => Some(rdev::Key::Num1),
        "2" => Some(rdev::Key::Num2),
        "3" => Some(rdev::Key::Num3),
        "4" => Some(rdev::Key::Num4),
        "5" => Some(rdev::Key::Num5),
        "6" => Some(rdev::Key::Num6),
        "7" => Some(rdev::Key::Num7),
        "8" => Some(rdev::Key::Num8),
        "9" => Some(rdev::Key::Num9),

        // Letter keys (case-insensitive)
        "A" | "a" => Some(rdev::Key::KeyA),
        "B" | "b" => Some(rdev::Key::KeyB),
        "C" | "c" => Some(rdev::Key::KeyC),
        "D" | "d" => Some(rdev::Key::KeyD),
        "E" | "e" => Some(rdev::Key::KeyE),
        "F" | "f" => Some(rdev::Key::KeyF),
        "G" | "g" => Some(rdev::Key::KeyG),
        "H" | "h" => Some(rdev::Key::KeyH),
        "I" | "i" => Some(rdev::Key::KeyI),
        "J" | "j" => Some(rdev::Key::KeyJ),
        "K" | "k" => Some(rdev::Key::KeyK),
        "L" | "l" => Some(rdev::Key::KeyL),
        "M" | "m" => Some(rdev::Key::KeyM),
        "N" | "n" => Some(rdev::Key::KeyN),
        "O" | "o" => Some(rdev::Key::KeyO),
        "P" | "p" => Some(rdev::Key::KeyP),
        "Q" | "q" => Some(rdev::Key::KeyQ),
        "R" | "r" => Some(rdev::Key::KeyR),
        "S" | "s" => Some(rdev::Key::KeyS),
        "T" | "t" => Some(rdev::Key::KeyT),
        "U" | "u" => Some(rdev::Key::KeyU),
        "V" | "v" => Some(rdev::Key::KeyV),
        "W" | "w" => Some(rdev::Key::KeyW),
        "X" | "x" => Some(rdev::Key::KeyX),
        "Y" | "y" => Some(rdev::Key::KeyY),
        "Z" | "z" => Some(rdev::Key::KeyZ),

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Modifiers / Chord
// ---------------------------------------------------------------------------

/// Set of held modifier keys.  Left and right variants are not told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Parse `"Ctrl+Alt"`-style modifier lists.  An empty string means none.
    pub fn parse(list: &str) -> Result<Self, HotkeyError> {
        let mut modifiers = Self::NONE;
        for part in list.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            if !modifiers.set_named(part) {
                return Err(HotkeyError::UnknownModifier(part.to_string()));
            }
        }
        Ok(modifiers)
    }

    /// Set the modifier called `name`.  Returns `false` for other names.
    fn set_named(&mut self, name: &str) -> bool {
        match name.to_ascii_lowercase().as_str() {
            "shift" => self.shift = true,
            "ctrl" | "control" => self.ctrl = true,
            "alt" | "option" => self.alt = true,
            "meta" | "super" | "win" | "cmd" => self.meta = true,
            _ => return false,
        }
        true
    }

    /// Record a modifier key going down or up.  Returns `false` when `key`
    /// is not a modifier.
    pub fn update(&mut self, key: rdev::Key, down: bool) -> bool {
        use rdev::Key;
        let flag = match key {
            Key::ShiftLeft | Key::ShiftRight => &mut self.shift,
            Key::ControlLeft | Key::ControlRight => &mut self.ctrl,
            Key::Alt | Key::AltGr => &mut self.alt,
            Key::MetaLeft | Key::MetaRight => &mut self.meta,
            _ => return false,
        };
        *flag = down;
        true
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.shift, "Shift"),
            (self.ctrl, "Ctrl"),
            (self.alt, "Alt"),
            (self.meta, "Meta"),
        ];
        let held: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&held.join("+"))
    }
}

/// A key pressed while exactly `modifiers` are held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chord {
    pub modifiers: Modifiers,
    pub key: rdev::Key,
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers != Modifiers::NONE {
            write!(f, "{}+", self.modifiers)?;
        }
        write!(f, "{:?}", self.key)
    }
}

/// Parse a chord such as `"Shift+Alt+Q"`.
///
/// The last component is the key; every earlier one must be a modifier.
///
/// ```
/// use soundboard::hotkey::{parse_chord, Modifiers};
///
/// let chord = parse_chord("Shift+Alt+Q").unwrap();
/// assert_eq!(chord.key, rdev::Key::KeyQ);
/// assert!(chord.modifiers.shift && chord.modifiers.alt);
/// assert!(!chord.modifiers.ctrl);
/// ```
pub fn parse_chord(chord: &str) -> Result<Chord, HotkeyError> {
    let (modifiers, key) = match chord.trim().rsplit_once('+') {
        Some((modifiers, key)) => (modifiers, key.trim()),
        None => ("", chord.trim()),
    };
    if key.is_empty() {
        return Err(HotkeyError::Empty);
    }
    Ok(Chord {
        modifiers: Modifiers::parse(modifiers)?,
        key: parse_key(key).ok_or_else(|| HotkeyError::UnknownKey(key.to_string()))?,
    })
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// One chord and the event it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub chord: Chord,
    pub event: HotkeyEvent,
}

/// Build the global bindings for `library` from `config`.
///
/// Quit and pause are bound first.  Category shortcuts that collide with an
/// earlier binding are skipped with a warning.
///
/// # Errors
///
/// Fails when the quit or pause chord or the category modifier cannot be
/// parsed.
pub fn build_bindings(library: &Library, config: &HotkeyConfig) -> Result<Vec<Binding>, HotkeyError> {
    let mut bindings = vec![
        Binding {
            chord: parse_chord(&config.quit)?,
            event: HotkeyEvent::Quit,
        },
        Binding {
            chord: parse_chord(&config.pause)?,
            event: HotkeyEvent::Pause,
        },
    ];

    if config.disable_category_shortcuts {
        log::info!("category shortcuts disabled");
        return Ok(bindings);
    }

    let modifiers = Modifiers::parse(&config.category_modifier)?;
    for category in library.categories() {
        let Some(key) = category
            .shortcut
            .and_then(|letter| parse_key(&letter.to_string()))
        else {
            continue;
        };
        let chord = Chord { modifiers, key };

        if let Some(taken) = bindings.iter().find(|b| b.chord == chord) {
            log::warn!(
                "shortcut {chord} for {:?} already bound to {:?}, skipping",
                category.name,
                taken.event
            );
            continue;
        }
        log::debug!("bound {chord} to {:?}", category.name);
        bindings.push(Binding {
            chord,
            event: HotkeyEvent::PlayCategory(category.name.clone()),
        });
    }

    Ok(bindings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Category;

    // ---- parse_key ---

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
    }

    #[test]
    fn parse_letters_and_digits() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
        assert_eq!(parse_key("0"), Some(rdev::Key::Num0));
        assert_eq!(parse_key("9"), Some(rdev::Key::Num9));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("Ctrl+V"), None);
    }

    // ---- parse_chord ---

    #[test]
    fn chord_with_modifiers() {
        let chord = parse_chord("Shift+Alt+Q").unwrap();
        assert_eq!(
            chord.modifiers,
            Modifiers {
                shift: true,
                alt: true,
                ..Modifiers::NONE
            }
        );
        assert_eq!(chord.key, rdev::Key::KeyQ);
        assert_eq!(chord.to_string(), "Shift+Alt+KeyQ");
    }

    #[test]
    fn chord_without_modifiers() {
        let chord = parse_chord("F9").unwrap();
        assert_eq!(chord.modifiers, Modifiers::NONE);
        assert_eq!(chord.to_string(), "F9");
    }

    #[test]
    fn chord_modifiers_are_case_insensitive() {
        let chord = parse_chord("ctrl + ALT + space").unwrap_err();
        // Key names are case-sensitive like parse_key; modifiers are not.
        assert_eq!(chord, HotkeyError::UnknownKey("space".into()));
        assert!(parse_chord("ctrl + ALT + Space").is_ok());
    }

    #[test]
    fn chord_errors() {
        assert_eq!(parse_chord(""), Err(HotkeyError::Empty));
        assert_eq!(parse_chord("Alt+"), Err(HotkeyError::Empty));
        assert_eq!(
            parse_chord("Hyper+Q"),
            Err(HotkeyError::UnknownModifier("Hyper".into()))
        );
    }

    #[test]
    fn modifier_keys_update_state() {
        let mut held = Modifiers::NONE;
        assert!(held.update(rdev::Key::ShiftRight, true));
        assert!(held.update(rdev::Key::Alt, true));
        assert!(!held.update(rdev::Key::KeyQ, true));
        assert_eq!(held.to_string(), "Shift+Alt");

        held.update(rdev::Key::ShiftLeft, false);
        assert_eq!(held.to_string(), "Alt");
    }

    // ---- build_bindings ---

    fn library(dirs: &[&str]) -> Library {
        Library::from_categories(dirs.iter().filter_map(|d| Category::from_dir(format!("/sounds/{d}"))))
    }

    #[test]
    fn bindings_cover_categories_pause_and_quit() {
        let bindings = build_bindings(&library(&["e_epic", "h_horn"]), &HotkeyConfig::default()).unwrap();

        let events: Vec<_> = bindings.iter().map(|b| b.event.clone()).collect();
        assert_eq!(
            events,
            vec![
                HotkeyEvent::Quit,
                HotkeyEvent::Pause,
                HotkeyEvent::PlayCategory("epic".into()),
                HotkeyEvent::PlayCategory("horn".into()),
            ]
        );
        assert_eq!(bindings[2].chord, parse_chord("Alt+E").unwrap());
    }

    #[test]
    fn colliding_shortcut_is_skipped() {
        let bindings =
            build_bindings(&library(&["e_epic", "e_eerie"]), &HotkeyConfig::default()).unwrap();
        // First category in library order keeps the shortcut.
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[2].event, HotkeyEvent::PlayCategory("epic".into()));
    }

    #[test]
    fn disabled_shortcuts_keep_pause_and_quit() {
        let config = HotkeyConfig {
            disable_category_shortcuts: true,
            ..HotkeyConfig::default()
        };
        let bindings = build_bindings(&library(&["e_epic"]), &config).unwrap();
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn bad_pause_chord_is_an_error() {
        let config = HotkeyConfig {
            pause: "Alt+Nope".into(),
            ..HotkeyConfig::default()
        };
        assert_eq!(
            build_bindings(&library(&[]), &config),
            Err(HotkeyError::UnknownKey("Nope".into()))
        );
    }
}
