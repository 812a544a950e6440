//! Hotkey loop, foreground lookup and console exit handling.
//!
//! The hotkey is registered with `RegisterHotKey` (thread-bound, no window)
//! and delivered as `WM_HOTKEY` to the `GetMessageW` loop on the calling
//! thread. `MOD_NOREPEAT` keeps a held hotkey from toggling repeatedly.
//!
//! The console control handler runs on a thread the OS creates. It runs the
//! registered cleanup, then posts `WM_QUIT` so the toggle loop returns and
//! `main` can exit normally.

use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use windows_sys::Win32::Foundation::{GetLastError, BOOL, FALSE, TRUE};
use windows_sys::Win32::System::Console::{
    SetConsoleCtrlHandler, CTRL_BREAK_EVENT, CTRL_CLOSE_EVENT, CTRL_C_EVENT,
};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, MOD_NOREPEAT,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetMessageW, GetWindowThreadProcessId, PostThreadMessageW, MSG,
    WM_HOTKEY, WM_QUIT,
};

use crate::keys::Hotkey;
use crate::platform::{Desktop, PlatformError};

const HOTKEY_ID: i32 = 9001;

/// Thread running the toggle loop; 0 when no loop is running.
static LOOP_THREAD: AtomicU32 = AtomicU32::new(0);

static EXIT_CLEANUP: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

pub struct WindowsDesktop;

impl WindowsDesktop {
    pub fn new() -> Self {
        WindowsDesktop
    }
}

impl Desktop for WindowsDesktop {
    fn foreground_process(&self) -> Option<u32> {
        unsafe {
            let fg = GetForegroundWindow();
            if fg.is_null() {
                return None;
            }
            let mut pid: u32 = 0;
            GetWindowThreadProcessId(fg, &mut pid);
            (pid != 0).then_some(pid)
        }
    }

    fn install_exit_handler(
        &self,
        cleanup: Box<dyn Fn() + Send + Sync>,
    ) -> Result<(), PlatformError> {
        EXIT_CLEANUP
            .set(cleanup)
            .map_err(|_| PlatformError::Other("exit handler already installed".into()))?;

        if unsafe { SetConsoleCtrlHandler(Some(console_handler), TRUE) } == 0 {
            return Err(PlatformError::Os {
                call: "SetConsoleCtrlHandler",
                code: unsafe { GetLastError() },
            });
        }
        Ok(())
    }

    fn run_toggle_loop(
        &self,
        hotkey: Hotkey,
        on_toggle: &mut dyn FnMut(Option<u32>),
    ) -> Result<(), PlatformError> {
        let registered = unsafe {
            RegisterHotKey(
                ptr::null_mut(),
                HOTKEY_ID,
                hotkey.modifiers.bits() | MOD_NOREPEAT,
                hotkey.vk as u32,
            )
        };
        if registered == 0 {
            return Err(PlatformError::Os {
                call: "RegisterHotKey",
                code: unsafe { GetLastError() },
            });
        }
        log::info!("hotkey registered: {hotkey}");

        LOOP_THREAD.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {
                if msg.message == WM_HOTKEY && msg.wParam == HOTKEY_ID as usize {
                    on_toggle(self.foreground_process());
                }
            }
        }

        LOOP_THREAD.store(0, Ordering::SeqCst);
        unsafe { UnregisterHotKey(ptr::null_mut(), HOTKEY_ID) };
        Ok(())
    }
}

unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT | CTRL_CLOSE_EVENT => {
            if let Some(cleanup) = EXIT_CLEANUP.get() {
                cleanup();
            }
            let thread = LOOP_THREAD.load(Ordering::SeqCst);
            if thread != 0 {
                PostThreadMessageW(thread, WM_QUIT, 0, 0);
            }
            TRUE
        }
        _ => FALSE,
    }
}
