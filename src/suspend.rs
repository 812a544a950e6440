//! Suspends or resumes every thread of a target process.
//!
//! Enumeration is a point-in-time snapshot; threads created or destroyed
//! while it runs are not chased. A thread that cannot be opened or
//! suspended (typically because it already exited) is skipped.

use std::sync::Arc;

use crate::platform::ThreadControl;

/// Process id meaning "no target".
pub const NO_TARGET: u32 = 0;

pub struct ProcessSuspender {
    threads: Arc<dyn ThreadControl>,
}

impl ProcessSuspender {
    pub fn new(threads: Arc<dyn ThreadControl>) -> Self {
        Self { threads }
    }

    /// Suspends (`true`) or resumes (`false`) all threads of `pid`.
    ///
    /// Returns the number of threads actually affected.
    pub fn set_suspended(&self, pid: u32, suspend: bool) -> usize {
        if pid == NO_TARGET {
            return 0;
        }

        let ids = match self.threads.thread_ids(pid) {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("suspend: cannot enumerate threads of {pid}: {e}");
                return 0;
            }
        };

        let mut affected = 0;
        for tid in ids {
            match self.threads.set_thread_suspended(tid, suspend) {
                Ok(()) => affected += 1,
                Err(e) => log::debug!("suspend: skipping thread {tid} of {pid}: {e}"),
            }
        }
        affected
    }
}
