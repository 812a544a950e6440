//! Windows platform backend.
//!
//! Interception: `WindowsCapture` (WH_KEYBOARD_LL on a message-loop thread).
//! Injection and live key state: `WindowsKeyboard` (SendInput,
//! GetAsyncKeyState, AttachThreadInput).
//! Suspension: `WindowsThreads` (ToolHelp snapshot, SuspendThread).
//! Hotkey and exit hook: `WindowsDesktop` (RegisterHotKey,
//! SetConsoleCtrlHandler).

mod capture;
mod desktop;
mod input;
mod threads;

use std::sync::Arc;

use capture::WindowsCapture;
use desktop::WindowsDesktop;
use input::WindowsKeyboard;
use threads::WindowsThreads;

use crate::platform::{Desktop, InputCapture, Keyboard, PlatformError, ThreadControl};

pub fn create_desktop() -> Result<Box<dyn Desktop>, PlatformError> {
    Ok(Box::new(WindowsDesktop::new()))
}

/// Returns a `WindowsCapture` backed by `WH_KEYBOARD_LL`.
pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Ok(Box::new(WindowsCapture::new()))
}

/// Returns a `WindowsKeyboard` backed by `SendInput`.
pub fn create_keyboard() -> Result<Arc<dyn Keyboard>, PlatformError> {
    Ok(Arc::new(WindowsKeyboard::new()))
}

pub fn create_thread_control() -> Result<Arc<dyn ThreadControl>, PlatformError> {
    Ok(Arc::new(WindowsThreads::new()))
}
