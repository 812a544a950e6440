//! Platform abstraction layer.
//!
//! Defines the seams the pause controller drives: keyboard interception
//! (`InputCapture`), live key state and synthetic input (`Keyboard`), thread
//! suspension (`ThreadControl`) and the hotkey/console surface (`Desktop`).
//! The Windows backend lives in a child module; every other target reports
//! `PlatformError::Unavailable` from its factories.

#[cfg(target_os = "windows")]
mod windows;

#[cfg(not(target_os = "windows"))]
mod unsupported;

#[cfg(target_os = "windows")]
pub use self::windows::{
    create_desktop, create_input_capture, create_keyboard, create_thread_control,
};

#[cfg(not(target_os = "windows"))]
pub use self::unsupported::{
    create_desktop, create_input_capture, create_keyboard, create_thread_control,
};

use std::sync::Arc;

use thiserror::Error;

use crate::keys::Hotkey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The backend cannot run in this environment at all.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// An OS call failed; `code` is the thread's last-error value.
    #[error("{call} failed (os error {code})")]
    Os { call: &'static str, code: u32 },

    #[error("{0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Key events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A physical (or injected) key event as seen by the interception hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub vk: u16,
    pub direction: KeyDirection,
    /// Extended-key bit (right-hand Ctrl/Alt, navigation cluster, ...).
    pub extended: bool,
    /// Set by the OS on events produced by `SendInput`, including our own.
    pub injected: bool,
}

impl RawKeyEvent {
    #[cfg(test)]
    pub fn physical(vk: u16, direction: KeyDirection) -> Self {
        Self {
            vk,
            direction,
            extended: false,
            injected: false,
        }
    }
}

/// What the hook does with an event once the callback has looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// Hand the event to the next hook and on to applications.
    Forward,
    /// Swallow the event system-wide.
    Suppress,
}

/// Interception strategy installed by `InputCapture::start`.
///
/// Runs inline in the system input path, so it must return quickly.
pub type HookCallback = Arc<dyn Fn(&RawKeyEvent) -> HookVerdict + Send + Sync>;

/// A keyboard event synthesized by this program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKey {
    pub vk: u16,
    pub direction: KeyDirection,
    pub extended: bool,
}

impl SyntheticKey {
    pub fn down(vk: u16, extended: bool) -> Self {
        Self {
            vk,
            direction: KeyDirection::Down,
            extended,
        }
    }

    pub fn up(vk: u16, extended: bool) -> Self {
        Self {
            vk,
            direction: KeyDirection::Up,
            extended,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// System-wide keyboard interception.
pub trait InputCapture: Send {
    /// Installs the hook and routes every key event through `callback`.
    fn start(&mut self, callback: HookCallback) -> Result<(), PlatformError>;

    /// Removes the hook. Must be safe to call from inside the callback and
    /// must not wait for the hook thread to finish.
    fn stop(&mut self) -> Result<(), PlatformError>;

    fn is_active(&self) -> bool;
}

/// Live keyboard state and synthetic input.
pub trait Keyboard: Send + Sync {
    /// True while `vk` is physically held down.
    fn is_key_down(&self, vk: u16) -> bool;

    /// Injects a single key event.
    fn send(&self, key: SyntheticKey) -> Result<(), PlatformError>;

    /// Attaches this thread's input state to the foreground window's thread.
    ///
    /// Returns the attached thread id, or `None` when there is no foreground
    /// window, it belongs to the calling thread, or attaching failed.
    fn attach_foreground(&self) -> Option<u32>;

    fn detach(&self, thread: u32);
}

/// Enumeration and suspension of a process's threads.
pub trait ThreadControl: Send + Sync {
    /// Point-in-time snapshot of the thread ids owned by `pid`.
    fn thread_ids(&self, pid: u32) -> Result<Vec<u32>, PlatformError>;

    fn set_thread_suspended(&self, thread: u32, suspend: bool) -> Result<(), PlatformError>;
}

/// Hotkey delivery, foreground lookup and the exit hook.
pub trait Desktop {
    /// Process id owning the foreground window, if there is one.
    fn foreground_process(&self) -> Option<u32>;

    /// Registers `cleanup` to run on interrupt, break, or console close.
    fn install_exit_handler(
        &self,
        cleanup: Box<dyn Fn() + Send + Sync>,
    ) -> Result<(), PlatformError>;

    /// Registers `hotkey` and blocks, calling `on_toggle` with the foreground
    /// process every time it fires. Returns once the exit handler has run.
    fn run_toggle_loop(
        &self,
        hotkey: Hotkey,
        on_toggle: &mut dyn FnMut(Option<u32>),
    ) -> Result<(), PlatformError>;
}

// ---------------------------------------------------------------------------
// Input-queue attachment guard
// ---------------------------------------------------------------------------

/// Keeps this thread attached to the foreground thread's input queue and
/// detaches on drop, including early returns.
pub struct InputAttachment<'a> {
    keyboard: &'a dyn Keyboard,
    thread: u32,
}

impl<'a> InputAttachment<'a> {
    pub fn foreground(keyboard: &'a dyn Keyboard) -> Option<Self> {
        keyboard
            .attach_foreground()
            .map(|thread| Self { keyboard, thread })
    }

    pub fn thread(&self) -> u32 {
        self.thread
    }
}

impl Drop for InputAttachment<'_> {
    fn drop(&mut self) {
        self.keyboard.detach(self.thread);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
