//! Fallback for targets without a backend.
//!
//! Thread suspension and low-level keyboard hooks are only implemented for
//! Windows. The factories fail up front so `main` can report it and exit
//! before anything is touched.

use std::sync::Arc;

use crate::platform::{Desktop, InputCapture, Keyboard, PlatformError, ThreadControl};

fn unavailable() -> PlatformError {
    PlatformError::Unavailable(format!(
        "{} is not supported; gamepauser requires Windows",
        std::env::consts::OS
    ))
}

pub fn create_desktop() -> Result<Box<dyn Desktop>, PlatformError> {
    Err(unavailable())
}

pub fn create_input_capture() -> Result<Box<dyn InputCapture>, PlatformError> {
    Err(unavailable())
}

pub fn create_keyboard() -> Result<Arc<dyn Keyboard>, PlatformError> {
    Err(unavailable())
}

pub fn create_thread_control() -> Result<Arc<dyn ThreadControl>, PlatformError> {
    Err(unavailable())
}
