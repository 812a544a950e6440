//! GamePauser -- suspend the foreground process on a hotkey, capture what is
//! typed while it is paused, and replay it on resume.
//!
//! Entry point: logging, configuration, backend wiring, and the guarantee
//! that no process is left suspended when this one exits.

mod config;
mod controller;
mod intercept;
mod keys;
mod platform;
mod replay;
mod session;
mod suspend;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use thiserror::Error;

use config::{Config, ConfigError};
use controller::{Backend, PauseController};
use platform::PlatformError;
use replay::{RandomTiming, ReplayEngine};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Ends any pause when dropped, covering early returns and panics.
struct EndSessionOnDrop(PauseController);

impl Drop for EndSessionOnDrop {
    fn drop(&mut self) {
        log::info!("shutting down - ensuring nothing stays paused");
        self.0.force_end();
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("gamepauser v{}", env!("CARGO_PKG_VERSION"));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let desktop = platform::create_desktop()?;
    let backend = Backend {
        capture: platform::create_input_capture()?,
        keyboard: platform::create_keyboard()?,
        threads: platform::create_thread_control()?,
    };

    let config = Config::load_or_create(&config::default_path()?)?;
    let hotkey = config.hotkey();

    let replay = ReplayEngine::new(backend.keyboard.clone(), Box::new(RandomTiming), config.replay);
    let controller = PauseController::new(backend, hotkey, replay, std::process::id());
    let guard = EndSessionOnDrop(controller.clone());

    let cleanup = controller.clone();
    desktop.install_exit_handler(Box::new(move || cleanup.force_end()))?;

    log::info!("special keys while paused: Escape = cancel, Enter = accept (without sending Enter)");
    desktop.run_toggle_loop(hotkey, &mut |foreground| {
        controller.toggle(foreground);
        log::debug!("state: {:?}", controller.state());
    })?;

    // Let an in-flight replay finish before the process goes away.
    controller.wait_idle();
    drop(guard);
    Ok(())
}
