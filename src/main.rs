//! Application entry point: soundboard.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (`./config.toml`, then the platform config dir).
//! 3. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Discover sound categories.
//! 5. Open the default output device and build the playback controller.
//! 6. Play the startup sound; failing to start it is fatal.
//! 7. Spawn the hotkey listener thread.
//! 8. Run the trigger dispatcher until Quit or Ctrl-C.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use soundboard::{
    audio::{CpalSink, SymphoniaDecoder},
    config::AppConfig,
    dispatch::TriggerDispatcher,
    hotkey::{build_bindings, HotkeyEvent, HotkeyListener},
    library::Library,
    playback::{PlayMode, PlaybackController},
    selector::Selector,
};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("soundboard starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Sound categories
    let library = Library::discover(&config.sounds_dir)
        .with_context(|| format!("cannot read sounds from {}", config.sounds_dir.display()))?;
    if library.is_empty() {
        log::warn!("no sound categories in {}", config.sounds_dir.display());
    } else {
        log::info!("categories: {}", library.public_names().join(", "));
    }

    // 5. Output device + playback
    let sink = CpalSink::open_default().context("cannot open audio output")?;
    let controller = PlaybackController::new(
        Arc::new(sink),
        Arc::new(SymphoniaDecoder),
        config.playback_options(),
        rt.handle().clone(),
    );

    // 6. Startup sound
    let startup = config.startup_sound_path();
    let mut request = controller.play(&startup, PlayMode::Replace);
    if !rt.block_on(request.started()) {
        let outcome = rt.block_on(request.finished());
        match outcome {
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("cannot play startup sound {}", startup.display()));
            }
            Ok(outcome) => bail!(
                "startup sound {} did not start ({outcome:?})",
                startup.display()
            ),
        }
    }

    // 7. Hotkeys
    let selector = Arc::new(Selector::new(library));
    let bindings =
        build_bindings(selector.library(), &config.hotkey).context("invalid hotkey config")?;
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyEvent>(16);
    let _hotkey_listener =
        HotkeyListener::start(bindings, hotkey_tx).context("cannot start hotkey listener")?;
    log::info!("Listening for keyboard shortcuts. Press {} to quit.", config.hotkey.quit);

    // 8. Dispatch until quit
    let dispatcher = TriggerDispatcher::new(
        selector,
        controller,
        config.hotkey.overlay_categories.clone(),
    );
    rt.block_on(async {
        tokio::select! {
            exit = dispatcher.run(hotkey_rx) => log::info!("dispatcher stopped: {exit:?}"),
            _ = tokio::signal::ctrl_c() => log::info!("interrupted"),
        }
    });

    log::info!("soundboard shutting down");
    Ok(())
}
