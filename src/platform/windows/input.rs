//! Live key state and synthetic input via SendInput.
//!
//! Injection is synchronous: `SendInput` returns after the event is queued.
//! Events injected here carry `LLKHF_INJECTED`, which the interception hook
//! uses to let them through.
//!
//! Synthetic input aimed at a window owned by another thread is only
//! reliable while this thread's input state is attached to that window's
//! thread, hence `attach_foreground`/`detach` around every batch.

use std::ptr;

use windows_sys::Win32::Foundation::{GetLastError, FALSE, TRUE};
use windows_sys::Win32::System::Threading::{AttachThreadInput, GetCurrentThreadId};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    GetAsyncKeyState, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
    KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

use crate::platform::{KeyDirection, Keyboard, PlatformError, SyntheticKey};

/// Stateless: every call goes straight to the OS.
pub struct WindowsKeyboard;

impl WindowsKeyboard {
    pub fn new() -> Self {
        WindowsKeyboard
    }
}

impl Keyboard for WindowsKeyboard {
    fn is_key_down(&self, vk: u16) -> bool {
        // High bit set (negative) while the key is down.
        unsafe { GetAsyncKeyState(vk as i32) < 0 }
    }

    fn send(&self, key: SyntheticKey) -> Result<(), PlatformError> {
        let mut dw_flags = 0;
        if key.extended {
            dw_flags |= KEYEVENTF_EXTENDEDKEY;
        }
        if key.direction == KeyDirection::Up {
            dw_flags |= KEYEVENTF_KEYUP;
        }

        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: key.vk,
                    wScan: 0,
                    dwFlags: dw_flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };

        let sent = unsafe { SendInput(1, &input, std::mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            let code = unsafe { GetLastError() };
            return Err(PlatformError::Os {
                call: "SendInput",
                code,
            });
        }

        log::trace!("input: injected {:#04x} {:?}", key.vk, key.direction);
        Ok(())
    }

    fn attach_foreground(&self) -> Option<u32> {
        unsafe {
            let fg = GetForegroundWindow();
            if fg.is_null() {
                return None;
            }
            let target = GetWindowThreadProcessId(fg, ptr::null_mut());
            let current = GetCurrentThreadId();
            if target == 0 || target == current {
                return None;
            }
            if AttachThreadInput(current, target, TRUE) == 0 {
                log::debug!("input: AttachThreadInput to {target} failed ({})", GetLastError());
                return None;
            }
            Some(target)
        }
    }

    fn detach(&self, thread: u32) {
        unsafe { AttachThreadInput(GetCurrentThreadId(), thread, FALSE) };
    }
}
