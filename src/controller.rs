//! The pause/resume state machine.
//!
//! `PauseController` owns the one `PauseSession` that can exist and drives
//! the transitions:
//!
//! - Idle --toggle(pid)--> Paused: release held keys, suspend, hook.
//! - Paused --toggle(same pid)--> Replaying --> Idle.
//! - Paused --toggle(other pid)--> Paused on the new pid; the old target is
//!   resumed and its capture discarded.
//! - Paused --Escape--> Idle: capture discarded.
//! - Paused --Enter--> Replaying --> Idle.
//!
//! Two threads touch the session: the toggle loop and the hook thread, which
//! classifies keys and runs Escape/Enter transitions inline. Both go through
//! one mutex. Replay sleeps, so it runs on its own short-lived thread; while
//! it does, toggles are ignored. Code reachable from the hook logs at debug
//! or below, since the console writer blocks.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use crate::intercept::{Decision, Interceptor};
use crate::keys::{Hotkey, Modifiers};
use crate::platform::{
    HookCallback, HookVerdict, InputCapture, Keyboard, RawKeyEvent, ThreadControl,
};
use crate::replay::ReplayEngine;
use crate::session::{CaptureLog, HeldKeySet, PauseSession};
use crate::suspend::ProcessSuspender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Paused,
    Replaying,
}

/// OS services the controller drives.
pub struct Backend {
    pub capture: Box<dyn InputCapture>,
    pub keyboard: Arc<dyn Keyboard>,
    pub threads: Arc<dyn ThreadControl>,
}

/// Cheap to clone; clones share the same state machine.
#[derive(Clone)]
pub struct PauseController {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled when a replay finishes.
    replay_done: Condvar,
    keyboard: Arc<dyn Keyboard>,
    suspender: ProcessSuspender,
    replay: Mutex<ReplayEngine>,
    own_pid: u32,
}

struct Inner {
    session: Option<PauseSession>,
    replaying: bool,
    interceptor: Interceptor,
    capture: Box<dyn InputCapture>,
}

impl PauseController {
    pub fn new(backend: Backend, hotkey: Hotkey, replay: ReplayEngine, own_pid: u32) -> Self {
        let shared = Shared {
            inner: Mutex::new(Inner {
                session: None,
                replaying: false,
                interceptor: Interceptor::new(hotkey),
                capture: backend.capture,
            }),
            replay_done: Condvar::new(),
            keyboard: backend.keyboard,
            suspender: ProcessSuspender::new(backend.threads),
            replay: Mutex::new(replay),
            own_pid,
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn state(&self) -> ControllerState {
        let inner = self.shared.lock();
        if inner.replaying {
            ControllerState::Replaying
        } else if inner.session.is_some() {
            ControllerState::Paused
        } else {
            ControllerState::Idle
        }
    }

    /// Handles the hotkey; `foreground` is the pid owning the foreground
    /// window when it fired.
    pub fn toggle(&self, foreground: Option<u32>) {
        self.shared.toggle(foreground);
    }

    /// Classifies one key event. Installed as the hook callback while paused.
    pub fn on_key(&self, event: &RawKeyEvent) -> HookVerdict {
        self.shared.on_key(event)
    }

    /// Removes the hook and resumes any suspended target.
    ///
    /// Called on every way out of the program so nothing stays suspended.
    pub fn force_end(&self) {
        self.shared.force_end();
    }

    /// Blocks until no replay is running.
    pub fn wait_idle(&self) {
        let inner = self.shared.lock();
        let _inner = self
            .shared
            .replay_done
            .wait_while(inner, |inner| inner.replaying)
            .unwrap_or_else(PoisonError::into_inner);
    }

    #[cfg(test)]
    pub(crate) fn target(&self) -> Option<u32> {
        self.shared.lock().session.as_ref().map(|s| s.target)
    }

    #[cfg(test)]
    pub(crate) fn captured(&self) -> Vec<(u16, crate::platform::KeyDirection)> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|s| s.log.events().iter().map(|e| (e.vk, e.direction)).collect())
            .unwrap_or_default()
    }
}

impl Shared {
    /// A poisoned lock still guards valid state; keep going so the target
    /// can always be resumed.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn toggle(self: &Arc<Self>, foreground: Option<u32>) {
        let Some(pid) = foreground else {
            log::debug!("toggle: no foreground window, ignored");
            return;
        };
        if pid == self.own_pid {
            log::debug!("toggle: foreground is this process, ignored");
            return;
        }

        let mut inner = self.lock();
        if inner.replaying {
            log::info!("toggle: replay in progress, ignored");
            return;
        }

        match inner.session.as_ref().map(|s| s.target) {
            Some(target) if target == pid => {
                if let Some((session, threads)) = self.end_session(&mut inner) {
                    log::info!("resumed {pid} - {threads} threads");
                    let (events, held) = session.into_capture();
                    self.start_replay(&mut inner, events, held);
                }
            }
            Some(target) => {
                log::info!("toggle: switching from {target} to {pid}");
                if let Some((_, threads)) = self.end_session(&mut inner) {
                    log::info!("resumed {target} - {threads} threads, capture discarded");
                }
                self.begin_pause(&mut inner, pid);
            }
            None => self.begin_pause(&mut inner, pid),
        }
    }

    fn begin_pause(self: &Arc<Self>, inner: &mut Inner, pid: u32) {
        // Checked before held keys are released, which clears their state.
        inner
            .interceptor
            .clear_stale_latch(|vk| self.keyboard.is_key_down(vk));

        let released = self
            .replay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release_held_keys();
        log::info!("cleared {released} held keys");

        let threads = self.suspender.set_suspended(pid, true);
        log::info!("paused {pid} - {threads} threads");
        inner.session = Some(PauseSession::new(pid));

        match inner.capture.start(self.hook_callback()) {
            Ok(()) => {
                log::info!("capturing keystrokes; they will be delivered on resume");
                log::info!("keyboard is blocked while paused (Esc = cancel, Enter = accept)");
            }
            Err(e) => log::warn!("capture unavailable, keys typed while paused are lost: {e}"),
        }
    }

    /// Disarms, unhooks, then resumes: once the hook is gone nothing more
    /// can be captured. Returns the ended session and the threads resumed.
    fn end_session(&self, inner: &mut Inner) -> Option<(PauseSession, usize)> {
        let mut session = inner.session.take()?;
        session.disarm();
        stop_capture(inner);
        let threads = self.suspender.set_suspended(session.target, false);
        log::debug!("resumed {} - {threads} threads", session.target);
        Some((session, threads))
    }

    fn start_replay(
        self: &Arc<Self>,
        inner: &mut Inner,
        mut events: CaptureLog,
        mut held: HeldKeySet,
    ) {
        inner.replaying = true;
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("replay".into())
            .spawn(move || {
                shared
                    .replay
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .deliver(&mut events, &mut held);
                shared.lock().replaying = false;
                shared.replay_done.notify_all();
            });
        if let Err(e) = spawned {
            log::error!("replay: cannot start worker thread, input dropped: {e}");
            inner.replaying = false;
        }
    }

    fn on_key(self: &Arc<Self>, event: &RawKeyEvent) -> HookVerdict {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let keyboard = self.keyboard.as_ref();
        let decision = inner.interceptor.classify(inner.session.as_mut(), event, || {
            Modifiers::from_live(keyboard)
        });

        match decision {
            Decision::Forward => HookVerdict::Forward,
            Decision::Suppress => HookVerdict::Suppress,
            Decision::Cancel => {
                if let Some((mut session, _)) = self.end_session(inner) {
                    log::debug!("escape: resumed {}, input discarded", session.target);
                    session.log.clear();
                    session.held.clear();
                }
                HookVerdict::Suppress
            }
            Decision::Accept => {
                if let Some((session, _)) = self.end_session(inner) {
                    let target = session.target;
                    let (events, held) = session.into_capture();
                    log::debug!("enter: resumed {target}, replaying {} events", events.len());
                    self.start_replay(inner, events, held);
                }
                HookVerdict::Suppress
            }
        }
    }

    fn force_end(&self) {
        let mut inner = self.lock();
        stop_capture(&mut inner);
        if self.end_session(&mut inner).is_some() {
            log::info!("shutdown: target resumed, capture discarded");
        }
    }

    /// Weak so an installed hook never keeps the controller alive.
    fn hook_callback(self: &Arc<Self>) -> HookCallback {
        let weak: Weak<Shared> = Arc::downgrade(self);
        Arc::new(move |event: &RawKeyEvent| match weak.upgrade() {
            Some(shared) => shared.on_key(event),
            None => HookVerdict::Forward,
        })
    }
}

fn stop_capture(inner: &mut Inner) {
    if inner.capture.is_active() {
        if let Err(e) = inner.capture.stop() {
            log::warn!("capture: failed to remove hook: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
