//! Windows keyboard interception via WH_KEYBOARD_LL (low-level keyboard hook).
//!
//! `WindowsCapture` implements `InputCapture`. `start()` spawns a background
//! thread that installs the hook and runs a `GetMessageW` loop (required for
//! low-level hooks to deliver events). `stop()` uninstalls the hook and posts
//! `WM_QUIT` to end the message loop.
//!
//! `stop()` does not join the hook thread. It is called from inside the hook
//! callback (Escape/Enter end the pause inline) and by the toggle loop while
//! it holds the session lock the hook thread may be waiting on; in both cases
//! joining would deadlock. The thread exits on its own once `WM_QUIT` is
//! delivered.
//!
//! Suppression: returning a non-zero `LRESULT` from the hook proc (without
//! calling `CallNextHookEx`) drops the event system-wide.
//!
//! Callback storage: `WH_KEYBOARD_LL` hook procs receive no `user_info`
//! pointer, so the callback is stored in a process-global `Mutex`. The hook
//! proc clones it out before calling so the callback can itself call
//! `stop()`. Only one `WindowsCapture` should be active at a time.

use std::ptr;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use windows_sys::Win32::Foundation::{GetLastError, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_EXTENDED, LLKHF_INJECTED, MSG, WH_KEYBOARD_LL,
    WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use crate::platform::{
    HookCallback, HookVerdict, InputCapture, KeyDirection, PlatformError, RawKeyEvent,
};

// ---------------------------------------------------------------------------
// Process-global callback storage
// ---------------------------------------------------------------------------

static HOOK_CALLBACK: Mutex<Option<HookCallback>> = Mutex::new(None);

fn set_callback(callback: Option<HookCallback>) {
    match HOOK_CALLBACK.lock() {
        Ok(mut guard) => *guard = callback,
        Err(poisoned) => *poisoned.into_inner() = callback,
    }
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Windows keyboard capture backend using `WH_KEYBOARD_LL`.
pub struct WindowsCapture {
    /// Handle returned by `SetWindowsHookExW`. Stored as isize for Send.
    hook: Option<isize>,
    /// Thread ID of the background message-loop thread; used for `PostThreadMessageW`.
    thread_id: u32,
}

impl WindowsCapture {
    pub fn new() -> Self {
        Self {
            hook: None,
            thread_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// InputCapture trait impl
// ---------------------------------------------------------------------------

impl InputCapture for WindowsCapture {
    fn start(&mut self, callback: HookCallback) -> Result<(), PlatformError> {
        if self.hook.is_some() {
            return Err(PlatformError::Other("keyboard hook already installed".into()));
        }

        // Store callback globally before the hook is installed.
        set_callback(Some(callback));

        // Background thread sends (hook_handle, thread_id) after setup. isize for Send.
        let (info_tx, info_rx) = mpsc::channel::<Result<(isize, u32), PlatformError>>();

        let spawned = thread::Builder::new()
            .name("keyboard-hook".into())
            .spawn(move || {
                // Install hook on this thread; the GetMessageW loop below keeps it alive.
                let hook =
                    unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), ptr::null_mut(), 0) };

                if hook.is_null() {
                    let code = unsafe { GetLastError() };
                    let _ = info_tx.send(Err(PlatformError::Os {
                        call: "SetWindowsHookExW",
                        code,
                    }));
                    return;
                }

                let thread_id = unsafe { GetCurrentThreadId() };
                let _ = info_tx.send(Ok((hook as isize, thread_id)));

                log::debug!("capture: WH_KEYBOARD_LL hook active");

                // Returns 0 on WM_QUIT, -1 on error; both exit the loop.
                unsafe {
                    let mut msg: MSG = std::mem::zeroed();
                    while GetMessageW(&mut msg, ptr::null_mut(), 0, 0) > 0 {}
                }

                log::debug!("capture: message loop exited");
            });

        if let Err(e) = spawned {
            set_callback(None);
            return Err(PlatformError::Other(format!("cannot spawn hook thread: {e}")));
        }

        match info_rx.recv() {
            Ok(Ok((hook, thread_id))) => {
                self.hook = Some(hook);
                self.thread_id = thread_id;
                Ok(())
            }
            Ok(Err(e)) => {
                set_callback(None);
                Err(e)
            }
            Err(_) => {
                set_callback(None);
                Err(PlatformError::Other(
                    "hook thread exited before reporting hook status".into(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        // Unhook first so no further events are routed to the callback.
        if let Some(hook) = self.hook.take() {
            unsafe { UnhookWindowsHookEx(hook as HHOOK) };
        }

        set_callback(None);

        if self.thread_id != 0 {
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) };
            self.thread_id = 0;
        }

        Ok(())
    }

    fn is_active(&self) -> bool {
        self.hook.is_some()
    }
}

impl Drop for WindowsCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Hook procedure
// ---------------------------------------------------------------------------

/// Low-level keyboard hook proc, called on the background message-loop thread.
///
/// Builds a `RawKeyEvent` and lets the callback decide. With no callback
/// installed, or for non-key messages, the event passes through.
unsafe extern "system" fn hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code != HC_ACTION as i32 {
        return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param);
    }

    let kb = &*(l_param as *const KBDLLHOOKSTRUCT);

    let direction = match w_param as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => KeyDirection::Down,
        WM_KEYUP | WM_SYSKEYUP => KeyDirection::Up,
        _ => return CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
    };

    let event = RawKeyEvent {
        vk: kb.vkCode as u16,
        direction,
        extended: kb.flags & LLKHF_EXTENDED != 0,
        injected: kb.flags & LLKHF_INJECTED != 0,
    };

    // Clone out so the guard is released before the callback runs.
    let callback = HOOK_CALLBACK.lock().ok().and_then(|guard| guard.clone());

    match callback.map_or(HookVerdict::Forward, |cb| cb(&event)) {
        HookVerdict::Forward => CallNextHookEx(ptr::null_mut(), n_code, w_param, l_param),
        HookVerdict::Suppress => 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
