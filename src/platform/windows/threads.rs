//! Thread enumeration and suspension via the ToolHelp snapshot API.
//!
//! Every handle opened here is wrapped in `OwnedHandle` so it is closed on
//! all paths, including early error returns.

use std::mem;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, FALSE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows_sys::Win32::System::Threading::{
    OpenThread, ResumeThread, SuspendThread, THREAD_SUSPEND_RESUME,
};

use crate::platform::{PlatformError, ThreadControl};

/// `SuspendThread`/`ResumeThread` failure sentinel.
const SUSPEND_FAILED: u32 = u32::MAX;

struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

fn last_error(call: &'static str) -> PlatformError {
    PlatformError::Os {
        call,
        code: unsafe { GetLastError() },
    }
}

pub struct WindowsThreads;

impl WindowsThreads {
    pub fn new() -> Self {
        WindowsThreads
    }
}

impl ThreadControl for WindowsThreads {
    fn thread_ids(&self, pid: u32) -> Result<Vec<u32>, PlatformError> {
        let raw = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) };
        if raw == INVALID_HANDLE_VALUE {
            return Err(last_error("CreateToolhelp32Snapshot"));
        }
        let snapshot = OwnedHandle(raw);

        let mut entry: THREADENTRY32 = unsafe { mem::zeroed() };
        entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

        let mut ids = Vec::new();
        if unsafe { Thread32First(snapshot.0, &mut entry) } == 0 {
            return Ok(ids);
        }
        loop {
            if entry.th32OwnerProcessID == pid {
                ids.push(entry.th32ThreadID);
            }
            if unsafe { Thread32Next(snapshot.0, &mut entry) } == 0 {
                break;
            }
        }
        Ok(ids)
    }

    fn set_thread_suspended(&self, thread: u32, suspend: bool) -> Result<(), PlatformError> {
        let raw = unsafe { OpenThread(THREAD_SUSPEND_RESUME, FALSE, thread) };
        if raw.is_null() {
            return Err(last_error("OpenThread"));
        }
        let handle = OwnedHandle(raw);

        let (call, previous) = if suspend {
            ("SuspendThread", unsafe { SuspendThread(handle.0) })
        } else {
            ("ResumeThread", unsafe { ResumeThread(handle.0) })
        };
        if previous == SUSPEND_FAILED {
            return Err(last_error(call));
        }
        Ok(())
    }
}
