//! [`PlaybackController`]: owns the foreground slot and serialises access to
//! the output device.
//!
//! Lock order, outermost first: replace lock → rate lock → device lock →
//! slot.  The two async locks are FIFO `tokio::sync::Mutex`es; the device
//! lock and the slot are `parking_lot` mutexes that are never held across an
//! `.await`.  Resampling runs with no lock held, so an Overlay never waits
//! for another request's resample.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

use crate::audio::{
    remix_channels, resample_clip, ClipFormat, DecodedClip, Decoder, DeviceSink, Mixer,
    VoiceCompletion, VoiceId,
};

use super::slot::{PlaybackSlot, SlotSnapshot, SlotState};
use super::{PlayMode, PlayOutcome, PlayRequest, PlaybackError, PlaybackOptions, RateStrategy};

struct Inner {
    sink: Arc<dyn DeviceSink>,
    decoder: Arc<dyn Decoder>,
    options: PlaybackOptions,
    runtime: Handle,
    /// Serialises Replace requests in submission order.
    replace_lock: tokio::sync::Mutex<()>,
    /// Held while the device rate is read, changed or relied upon.
    rate_lock: tokio::sync::Mutex<()>,
    slot: Mutex<PlaybackSlot>,
    next_generation: AtomicU64,
    /// Generation of the newest Replace submitted so far.
    latest_replace: AtomicU64,
    status: watch::Sender<SlotSnapshot>,
}

/// Plays clips on a [`DeviceSink`], keeping at most one foreground voice.
///
/// Cheap to clone; all clones drive the same slot.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

impl PlaybackController {
    /// Create a controller that spawns its request tasks on `runtime`.
    pub fn new(
        sink: Arc<dyn DeviceSink>,
        decoder: Arc<dyn Decoder>,
        options: PlaybackOptions,
        runtime: Handle,
    ) -> Self {
        let (status, _) = watch::channel(SlotSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                sink,
                decoder,
                options,
                runtime,
                replace_lock: tokio::sync::Mutex::new(()),
                rate_lock: tokio::sync::Mutex::new(()),
                slot: Mutex::new(PlaybackSlot::default()),
                next_generation: AtomicU64::new(0),
                latest_replace: AtomicU64::new(0),
                status,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Submit `path` for playback and return immediately.
    ///
    /// May be called from any thread; the work runs on the controller's
    /// runtime.  Failures are logged and reported through the returned
    /// [`PlayRequest`].
    pub fn play(&self, path: impl Into<PathBuf>, mode: PlayMode) -> PlayRequest {
        let path = path.into();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        if mode == PlayMode::Replace {
            self.inner
                .latest_replace
                .fetch_max(generation, Ordering::SeqCst);
        }

        let (started_tx, started_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let task = self.inner.runtime.spawn(async move {
            let result = match mode {
                PlayMode::Replace => run_replace(&inner, generation, &path, started_tx).await,
                PlayMode::Overlay => run_overlay(&inner, &path, started_tx).await,
            };
            match &result {
                Ok(outcome) => log::debug!("#{generation} {}: {outcome:?}", path.display()),
                Err(e) => log::warn!("#{generation} playback failed: {e}"),
            }
            result
        });

        PlayRequest::new(generation, started_rx, task)
    }

    /// Detach the foreground voice.  The device stays open.
    ///
    /// Only a playing slot is affected; pausing in any other state is a
    /// no-op, so repeated calls are harmless.  Returns whether a voice was
    /// paused.
    pub fn pause(&self) -> bool {
        let inner = &self.inner;
        let mut mixer = inner.sink.lock();
        let mut slot = inner.slot.lock();

        match slot.pause() {
            Some(voice) => {
                mixer.detach(voice);
                log::info!("paused #{}", slot.generation());
                inner.publish(&slot);
                true
            }
            None => {
                log::debug!("pause ignored while {}", slot.state().label());
                false
            }
        }
    }

    pub fn state(&self) -> SlotState {
        self.inner.slot.lock().state()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        self.inner.slot.lock().snapshot()
    }

    /// Receive every slot transition.
    pub fn subscribe(&self) -> watch::Receiver<SlotSnapshot> {
        self.inner.status.subscribe()
    }

    /// Rate the device is currently running at.
    pub fn device_rate(&self) -> Option<u32> {
        self.inner.sink.sample_rate()
    }
}

impl Inner {
    fn publish(&self, slot: &PlaybackSlot) {
        self.status.send_replace(slot.snapshot());
    }
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

async fn run_replace(
    inner: &Arc<Inner>,
    generation: u64,
    path: &Path,
    started: oneshot::Sender<()>,
) -> Result<PlayOutcome, PlaybackError> {
    let turn = inner.replace_lock.lock().await;
    if inner.latest_replace.load(Ordering::SeqCst) > generation {
        return Ok(PlayOutcome::Superseded);
    }

    let clip = load_clip(inner, path).await?;

    let device_rate = {
        let _rate = inner.rate_lock.lock().await;
        match inner.sink.sample_rate() {
            None => {
                reopen_device(inner, generation, clip.sample_rate).await?;
                clip.sample_rate
            }
            Some(rate)
                if rate != clip.sample_rate
                    && inner.options.rate_strategy == RateStrategy::Reinitialize =>
            {
                log::info!(
                    "reinitialising output {rate} Hz → {} Hz for {}",
                    clip.sample_rate,
                    path.display()
                );
                reopen_device(inner, generation, clip.sample_rate).await?;
                clip.sample_rate
            }
            Some(rate) => rate,
        }
    };

    let placed = place_clip(inner, clip, device_rate, path, |mixer, clip| {
        let mut slot = inner.slot.lock();
        if !slot.accepts(generation) {
            return None;
        }

        let (voice, done) = mixer.add(clip);
        if let Some(old) = slot.attach(generation, voice, path) {
            mixer.detach(old);
            log::debug!("#{generation} replaced the foreground voice");
        }
        inner.publish(&slot);
        Some((voice, done))
    })
    .await?;
    drop(turn);

    let Some((voice, done)) = placed else {
        return Ok(PlayOutcome::Superseded);
    };

    log::info!("playing {} (#{generation})", path.display());
    let _ = started.send(());

    Ok(await_foreground(inner, generation, voice, done).await)
}

/// Claim the slot and (re)open the device at `rate`, detaching the
/// foreground voice first.  Must be called with the rate lock held.
async fn reopen_device(
    inner: &Arc<Inner>,
    generation: u64,
    rate: u32,
) -> Result<(), PlaybackError> {
    let previous = {
        let mut mixer = inner.sink.lock();
        let mut slot = inner.slot.lock();
        let previous = slot.state();
        if let Some(old) = slot.begin_init(generation) {
            mixer.detach(old);
        }
        inner.publish(&slot);
        previous
    };

    match initialize(inner, rate).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let mut slot = inner.slot.lock();
            slot.abort_init(generation, previous);
            inner.publish(&slot);
            Err(e)
        }
    }
}

/// Wait for the foreground voice to end and clear the slot if it still
/// belongs to `generation`.
async fn await_foreground(
    inner: &Arc<Inner>,
    generation: u64,
    voice: VoiceId,
    done: VoiceCompletion,
) -> PlayOutcome {
    if done.await.is_err() {
        return PlayOutcome::Interrupted;
    }

    let _mixer = inner.sink.lock();
    let mut slot = inner.slot.lock();
    if slot.finish(generation, voice) {
        inner.publish(&slot);
    }
    PlayOutcome::Finished
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

async fn run_overlay(
    inner: &Arc<Inner>,
    path: &Path,
    started: oneshot::Sender<()>,
) -> Result<PlayOutcome, PlaybackError> {
    let clip = load_clip(inner, path).await?;

    let device_rate = {
        let _rate = inner.rate_lock.lock().await;
        match inner.sink.sample_rate() {
            Some(rate) => rate,
            None => {
                initialize(inner, clip.sample_rate).await?;
                clip.sample_rate
            }
        }
    };
    let done =
        place_clip(inner, clip, device_rate, path, |mixer, clip| mixer.add(clip).1).await?;

    log::info!("overlaying {}", path.display());
    let _ = started.send(());

    Ok(match done.await {
        Ok(()) => PlayOutcome::Finished,
        Err(_) => PlayOutcome::Interrupted,
    })
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Adapt `clip` to `device_rate` without holding any lock, then hand it to
/// `place` under the rate lock and the device lock.
///
/// If the device was reopened at another rate while resampling, the clip is
/// adapted again to the new rate.  A device that was closed in the meantime
/// is reopened at the clip's current rate.
async fn place_clip<T>(
    inner: &Arc<Inner>,
    mut clip: DecodedClip,
    mut device_rate: u32,
    path: &Path,
    place: impl FnOnce(&mut Mixer, DecodedClip) -> T,
) -> Result<T, PlaybackError> {
    loop {
        clip = adapt_clip(inner, clip, device_rate, path).await?;

        let _rate = inner.rate_lock.lock().await;
        match inner.sink.sample_rate() {
            Some(rate) if rate == device_rate => {}
            Some(rate) => {
                log::debug!(
                    "device moved {device_rate} Hz → {rate} Hz while adapting {}",
                    path.display()
                );
                device_rate = rate;
                continue;
            }
            None => initialize(inner, device_rate).await?,
        }

        let mut mixer = inner.sink.lock();
        return Ok(place(&mut mixer, clip));
    }
}

// ---------------------------------------------------------------------------
// Blocking helpers
// ---------------------------------------------------------------------------

async fn load_clip(inner: &Arc<Inner>, path: &Path) -> Result<DecodedClip, PlaybackError> {
    let decoder = Arc::clone(&inner.decoder);
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<DecodedClip, PlaybackError> {
        let file = File::open(&path).map_err(|source| PlaybackError::Io {
            path: path.clone(),
            source,
        })?;
        let format = ClipFormat::from_path(&path);
        let clip = decoder
            .decode(Box::new(BufReader::new(file)), format)
            .map_err(|source| PlaybackError::Decode {
                path: path.clone(),
                source,
            })?;
        log::debug!(
            "decoded {} ({format:?}, {} Hz, {} ch, {:.2}s)",
            path.display(),
            clip.sample_rate,
            clip.channels,
            clip.duration().as_secs_f32()
        );
        Ok(clip)
    })
    .await
    .map_err(|e| PlaybackError::Task(e.to_string()))?
}

/// Convert `clip` to the device's rate and channel count.
async fn adapt_clip(
    inner: &Arc<Inner>,
    clip: DecodedClip,
    device_rate: u32,
    path: &Path,
) -> Result<DecodedClip, PlaybackError> {
    let channels = inner.sink.channels();
    let quality = inner.options.resample_quality;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<DecodedClip, PlaybackError> {
        let clip = if clip.sample_rate == device_rate {
            clip
        } else {
            log::debug!("resampling {} Hz → {device_rate} Hz", clip.sample_rate);
            resample_clip(&clip, device_rate, quality)
                .map_err(|source| PlaybackError::Resample { path, source })?
        };
        Ok(remix_channels(clip, channels))
    })
    .await
    .map_err(|e| PlaybackError::Task(e.to_string()))?
}

async fn initialize(inner: &Arc<Inner>, rate: u32) -> Result<(), PlaybackError> {
    let sink = Arc::clone(&inner.sink);
    tokio::task::spawn_blocking(move || sink.initialize(rate))
        .await
        .map_err(|e| PlaybackError::Task(e.to_string()))??;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
