//! Single-slot playback control.
//!
//! # Architecture
//!
//! ```text
//! play(path, Replace) ──▶ tokio task
//!        │
//!        ├─ replace lock (FIFO)       one Replace at a time
//!        ├─ spawn_blocking(decode)    Decoder capability
//!        ├─ rate lock                 open device / resample / reinitialise
//!        ├─ device lock + slot        detach old voice, attach new one
//!        └─ await voice completion    Finished | Interrupted
//!
//! play(path, Overlay) ──▶ tokio task: decode → rate lock → add voice
//! pause()             ──▶ device lock + slot: detach the foreground voice
//! ```
//!
//! Every request is numbered at submission.  The slot only accepts requests
//! at least as new as the one that holds it, and only the holder may clear
//! it when its voice ends.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use soundboard::audio::{CpalSink, SymphoniaDecoder};
//! use soundboard::playback::{PlayMode, PlaybackController, PlaybackOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let controller = PlaybackController::new(
//!         Arc::new(CpalSink::open_default().unwrap()),
//!         Arc::new(SymphoniaDecoder),
//!         PlaybackOptions::default(),
//!         tokio::runtime::Handle::current(),
//!     );
//!
//!     let request = controller.play("sounds/e_epic/boom.ogg", PlayMode::Replace);
//!     println!("{:?}", request.finished().await);
//! }
//! ```

pub mod controller;
pub mod slot;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::audio::{DecodeError, DeviceError, ResampleError, ResampleQuality};

pub use controller::PlaybackController;
pub use slot::{SlotSnapshot, SlotState};

// ---------------------------------------------------------------------------
// PlayMode / RateStrategy / PlaybackOptions
// ---------------------------------------------------------------------------

/// How a new clip relates to the foreground slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    /// Detach whatever is in the foreground and take its place.
    Replace,
    /// Play as an independent voice; the foreground slot is not touched.
    Overlay,
}

/// What to do when a clip's rate differs from the running device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateStrategy {
    /// Keep the device rate and resample the clip.
    #[default]
    Resample,
    /// Reopen the device at the clip's rate.  Only Replace requests do this;
    /// overlays always follow the running device.
    Reinitialize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackOptions {
    pub rate_strategy: RateStrategy,
    pub resample_quality: ResampleQuality,
}

// ---------------------------------------------------------------------------
// PlaybackError / PlayOutcome
// ---------------------------------------------------------------------------

/// Errors reported through a [`PlayRequest`].  None of them leave the device
/// or the foreground slot changed, except a failed device (re)open.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("cannot resample {path}: {source}")]
    Resample {
        path: PathBuf,
        #[source]
        source: ResampleError,
    },

    #[error("output device: {0}")]
    Device(#[from] DeviceError),

    /// The playback task panicked or was cancelled.
    #[error("playback task failed: {0}")]
    Task(String),
}

/// How a request that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The clip played to its last sample.
    Finished,
    /// The voice was detached by a pause or a newer Replace.
    Interrupted,
    /// A newer Replace was submitted before this one reached the device.
    ///
    /// A Replace still queued behind the replace lock when a newer one
    /// arrives is dropped without decoding, since its swap would be undone
    /// immediately.
    Superseded,
}

// ---------------------------------------------------------------------------
// PlayRequest
// ---------------------------------------------------------------------------

/// Handle to one submitted clip.
///
/// Dropping the handle does not stop playback.
#[derive(Debug)]
pub struct PlayRequest {
    generation: u64,
    started: Option<oneshot::Receiver<()>>,
    has_started: bool,
    task: JoinHandle<Result<PlayOutcome, PlaybackError>>,
}

impl PlayRequest {
    pub(crate) fn new(
        generation: u64,
        started: oneshot::Receiver<()>,
        task: JoinHandle<Result<PlayOutcome, PlaybackError>>,
    ) -> Self {
        Self {
            generation,
            started: Some(started),
            has_started: false,
            task,
        }
    }

    /// Submission order of this request; later requests have larger numbers.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait until the clip is audible.
    ///
    /// Returns `false` when the request ended without ever reaching the
    /// device (error or superseded); [`PlayRequest::finished`] tells which.
    pub async fn started(&mut self) -> bool {
        if let Some(rx) = self.started.take() {
            self.has_started = rx.await.is_ok();
        }
        self.has_started
    }

    /// Wait for the request to end.
    pub async fn finished(self) -> Result<PlayOutcome, PlaybackError> {
        self.task
            .await
            .map_err(|e| PlaybackError::Task(e.to_string()))?
    }
}
