//! Audio output via `cpal`.
//!
//! [`DeviceSink`] is the output capability the playback controller consumes.
//! A sink owns a [`Mixer`] behind the *device lock*; the hardware callback
//! drains it and the controller adds and detaches voices through
//! [`DeviceSink::lock`].
//!
//! [`CpalSink`] drives the system default output device.  `cpal::Stream` is
//! not `Send` on every platform, so the stream lives on a dedicated
//! `audio-output` thread and (re)initialisation is a command sent to it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use super::Mixer;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening or reconfiguring the output device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to list supported output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("output device does not support {0} Hz")]
    UnsupportedRate(u32),

    #[error("unsupported output sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio output thread is gone")]
    Disconnected,

    #[error("failed to spawn audio output thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// DeviceSink trait
// ---------------------------------------------------------------------------

/// An output device feeding a [`Mixer`].
pub trait DeviceSink: Send + Sync + 'static {
    /// (Re)open the device at `sample_rate`.  Blocks until the stream runs.
    /// On failure the device is left closed and [`DeviceSink::sample_rate`]
    /// reports `None`.
    ///
    /// Must not be called while holding [`DeviceSink::lock`]: tearing down
    /// the old stream waits for its callback, which takes the same lock.
    fn initialize(&self, sample_rate: u32) -> Result<(), DeviceError>;

    /// Current stream rate, `None` until the first successful
    /// [`DeviceSink::initialize`].
    fn sample_rate(&self) -> Option<u32>;

    /// Channel count every voice must be mixed to.
    fn channels(&self) -> u16;

    /// Take the device lock.
    fn lock(&self) -> MutexGuard<'_, Mixer>;
}

const _: fn() = || {
    fn _assert_object_safe(_: std::sync::Arc<dyn DeviceSink>) {}
};

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

struct OpenCommand {
    sample_rate: u32,
    reply: mpsc::Sender<Result<(), DeviceError>>,
}

/// [`DeviceSink`] on the default cpal output device.
///
/// # Example
///
/// ```rust,no_run
/// use soundboard::audio::{CpalSink, DeviceSink};
///
/// let sink = CpalSink::open_default().unwrap();
/// sink.initialize(48_000).unwrap();
/// assert_eq!(sink.sample_rate(), Some(48_000));
/// ```
pub struct CpalSink {
    mixer: Arc<Mutex<Mixer>>,
    /// 0 while uninitialised.
    sample_rate: AtomicU32,
    channels: u16,
    /// Serialises `initialize` calls and owns the command channel.
    commands: Mutex<mpsc::Sender<OpenCommand>>,
}

impl CpalSink {
    /// Locate the default output device and start its owner thread.
    ///
    /// No stream runs until [`DeviceSink::initialize`] is called.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NoDevice`] or [`DeviceError::DefaultConfig`] when the
    /// host has no usable output device.
    pub fn open_default() -> Result<Self, DeviceError> {
        let (tx, rx) = mpsc::channel::<OpenCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u16, u32), DeviceError>>();
        let mixer = Arc::new(Mutex::new(Mixer::new(0)));
        let thread_mixer = Arc::clone(&mixer);

        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let device = match default_device() {
                    Ok((device, channels, rate)) => {
                        let _ = ready_tx.send(Ok((channels, rate)));
                        device
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_output_thread(device, thread_mixer, rx);
            })?;

        let (channels, default_rate) = ready_rx.recv().map_err(|_| DeviceError::Disconnected)??;
        *mixer.lock() = Mixer::new(channels);
        log::info!("output device ready: {channels} channel(s), default {default_rate} Hz");

        Ok(Self {
            mixer,
            sample_rate: AtomicU32::new(0),
            channels,
            commands: Mutex::new(tx),
        })
    }
}

impl DeviceSink for CpalSink {
    fn initialize(&self, sample_rate: u32) -> Result<(), DeviceError> {
        let commands = self.commands.lock();
        let (reply_tx, reply_rx) = mpsc::channel();
        commands
            .send(OpenCommand {
                sample_rate,
                reply: reply_tx,
            })
            .map_err(|_| DeviceError::Disconnected)?;
        let result = reply_rx.recv().map_err(|_| DeviceError::Disconnected)?;

        // A failed open has already torn down the previous stream.
        let current = if result.is_ok() { sample_rate } else { 0 };
        self.sample_rate.store(current, Ordering::Release);
        result
    }

    fn sample_rate(&self) -> Option<u32> {
        match self.sample_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock()
    }
}

fn default_device() -> Result<(cpal::Device, u16, u32), DeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(DeviceError::NoDevice)?;
    let config = device.default_output_config()?;
    Ok((device, config.channels(), config.sample_rate().0))
}

/// Owner loop for the cpal stream.  Exits once the sink is dropped.
fn run_output_thread(
    device: cpal::Device,
    mixer: Arc<Mutex<Mixer>>,
    commands: mpsc::Receiver<OpenCommand>,
) {
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(OpenCommand { sample_rate, reply }) = commands.recv() {
        // Stop the old stream before asking the driver for a new rate.
        drop(stream.take());

        let result = open_stream(&device, &mixer, sample_rate).map(|new| {
            stream = Some(new);
        });
        match &result {
            Ok(()) => log::info!("output stream running at {sample_rate} Hz"),
            Err(e) => log::error!("failed to open output stream at {sample_rate} Hz: {e}"),
        }
        let _ = reply.send(result);
    }

    log::debug!("audio output thread exiting");
}

fn open_stream(
    device: &cpal::Device,
    mixer: &Arc<Mutex<Mixer>>,
    sample_rate: u32,
) -> Result<cpal::Stream, DeviceError> {
    let channels = mixer.lock().channels();
    let supported = choose_config(device.supported_output_configs()?, channels, sample_rate)?;

    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, &config, Arc::clone(mixer))?,
        cpal::SampleFormat::I16 => build_stream::<i16>(device, &config, Arc::clone(mixer))?,
        cpal::SampleFormat::U16 => build_stream::<u16>(device, &config, Arc::clone(mixer))?,
        other => return Err(DeviceError::UnsupportedFormat(other)),
    };
    stream.play()?;
    Ok(stream)
}

/// First range with `channels` that covers `sample_rate` in a format the
/// mixer can write.
fn choose_config(
    ranges: impl IntoIterator<Item = cpal::SupportedStreamConfigRange>,
    channels: u16,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    let rate = cpal::SampleRate(sample_rate);
    let mut unplayable = None;

    for range in ranges {
        if range.channels() != channels
            || rate < range.min_sample_rate()
            || range.max_sample_rate() < rate
        {
            continue;
        }
        if is_playable(range.sample_format()) {
            return Ok(range.with_sample_rate(rate));
        }
        unplayable.get_or_insert(range.sample_format());
    }

    Err(match unplayable {
        Some(format) => DeviceError::UnsupportedFormat(format),
        None => DeviceError::UnsupportedRate(sample_rate),
    })
}

fn is_playable(format: cpal::SampleFormat) -> bool {
    matches!(
        format,
        cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
    )
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<cpal::Stream, DeviceError> {
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.lock().fill(&mut scratch);
            for (out, &sample) in data.iter_mut().zip(&scratch) {
                *out = T::from_sample(sample);
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    )?;
    Ok(stream)
}

// ---------------------------------------------------------------------------
// MockSink (tests only)
// ---------------------------------------------------------------------------

/// In-process [`DeviceSink`] whose mixer is advanced by [`MockSink::pump`].
#[cfg(test)]
pub struct MockSink {
    mixer: Mutex<Mixer>,
    channels: u16,
    sample_rate: Mutex<Option<u32>>,
    inits: Mutex<Vec<u32>>,
    fail_init: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MockSink {
    pub fn new(channels: u16) -> Self {
        Self {
            mixer: Mutex::new(Mixer::new(channels)),
            channels,
            sample_rate: Mutex::new(None),
            inits: Mutex::new(Vec::new()),
            fail_init: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// A sink that is already running at `sample_rate`.
    pub fn running(channels: u16, sample_rate: u32) -> Self {
        let sink = Self::new(channels);
        *sink.sample_rate.lock() = Some(sample_rate);
        sink
    }

    /// Make subsequent `initialize` calls fail.
    pub fn fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Every rate passed to a successful `initialize`, in order.
    pub fn inits(&self) -> Vec<u32> {
        self.inits.lock().clone()
    }

    /// Play `frames` frames of output, as the hardware callback would.
    pub fn pump(&self, frames: usize) -> Vec<f32> {
        let mut mixer = self.mixer.lock();
        let mut out = vec![0.0; frames * mixer.channels() as usize];
        mixer.fill(&mut out);
        out
    }
}

#[cfg(test)]
impl DeviceSink for MockSink {
    fn initialize(&self, sample_rate: u32) -> Result<(), DeviceError> {
        if self.fail_init.load(Ordering::SeqCst) {
            *self.sample_rate.lock() = None;
            return Err(DeviceError::UnsupportedRate(sample_rate));
        }
        *self.sample_rate.lock() = Some(sample_rate);
        self.inits.lock().push(sample_rate);
        Ok(())
    }

    fn sample_rate(&self) -> Option<u32> {
        *self.sample_rate.lock()
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn lock(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
