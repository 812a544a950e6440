//! Recording fakes of the platform traits for unit tests.
//!
//! Every fake appends to one shared journal so tests can assert the exact
//! interleaving of hook, thread, injection and timing calls.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::config::ReplayTiming;
use crate::controller::{Backend, PauseController};
use crate::keys::Hotkey;
use crate::platform::{
    HookCallback, HookVerdict, InputCapture, KeyDirection, Keyboard, PlatformError, RawKeyEvent,
    SyntheticKey, ThreadControl,
};
use crate::replay::{ReplayEngine, Timing};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CaptureStart,
    CaptureStop,
    Send(SyntheticKey),
    Attach(u32),
    Detach(u32),
    SuspendThread(u32),
    ResumeThread(u32),
    Delay(Duration),
}

type Journal = Arc<Mutex<Vec<Call>>>;

fn record(journal: &Journal, call: Call) {
    journal.lock().unwrap().push(call);
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

#[derive(Default)]
struct HookSlot {
    callback: Option<HookCallback>,
    fail_start: bool,
}

pub struct FakeCapture {
    journal: Journal,
    slot: Arc<Mutex<HookSlot>>,
}

impl InputCapture for FakeCapture {
    fn start(&mut self, callback: HookCallback) -> Result<(), PlatformError> {
        let mut slot = self.slot.lock().unwrap();
        if slot.fail_start {
            return Err(PlatformError::Os {
                call: "SetWindowsHookExW",
                code: 5,
            });
        }
        slot.callback = Some(callback);
        record(&self.journal, Call::CaptureStart);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        self.slot.lock().unwrap().callback = None;
        record(&self.journal, Call::CaptureStop);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.slot.lock().unwrap().callback.is_some()
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

#[derive(Default)]
struct KeyboardState {
    down: BTreeSet<u16>,
    rejected: BTreeSet<u16>,
    detached: bool,
}

pub struct FakeKeyboard {
    journal: Journal,
    state: Mutex<KeyboardState>,
}

impl FakeKeyboard {
    /// Marks keys as physically held.
    pub fn hold(&self, vks: &[u16]) {
        self.state.lock().unwrap().down.extend(vks.iter().copied());
    }

    /// Makes every injection of `vk` fail.
    pub fn reject(&self, vk: u16) {
        self.state.lock().unwrap().rejected.insert(vk);
    }

    pub fn set_attachable(&self, attachable: bool) {
        self.state.lock().unwrap().detached = !attachable;
    }
}

impl Keyboard for FakeKeyboard {
    fn is_key_down(&self, vk: u16) -> bool {
        self.state.lock().unwrap().down.contains(&vk)
    }

    fn send(&self, key: SyntheticKey) -> Result<(), PlatformError> {
        if self.state.lock().unwrap().rejected.contains(&key.vk) {
            return Err(PlatformError::Os {
                call: "SendInput",
                code: 5,
            });
        }
        record(&self.journal, Call::Send(key));
        Ok(())
    }

    fn attach_foreground(&self) -> Option<u32> {
        if self.state.lock().unwrap().detached {
            return None;
        }
        record(&self.journal, Call::Attach(FakeBackend::FOREGROUND_THREAD));
        Some(FakeBackend::FOREGROUND_THREAD)
    }

    fn detach(&self, thread: u32) {
        record(&self.journal, Call::Detach(thread));
    }
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ThreadTable {
    processes: BTreeMap<u32, Vec<u32>>,
    dead: BTreeSet<u32>,
    suspended: BTreeSet<u32>,
    /// Set when a thread was suspended while another process was.
    overlapped: bool,
}

impl ThreadTable {
    fn owner(&self, thread: u32) -> Option<u32> {
        self.processes
            .iter()
            .find(|(_, threads)| threads.contains(&thread))
            .map(|(&pid, _)| pid)
    }
}

pub struct FakeThreads {
    journal: Journal,
    table: Mutex<ThreadTable>,
}

impl FakeThreads {
    pub fn add_process(&self, pid: u32, threads: &[u32]) {
        self.table
            .lock()
            .unwrap()
            .processes
            .insert(pid, threads.to_vec());
    }

    /// The thread still shows up in snapshots but can no longer be opened.
    pub fn kill_thread(&self, tid: u32) {
        self.table.lock().unwrap().dead.insert(tid);
    }

    /// True if two processes were ever suspended at the same time.
    pub fn overlapped(&self) -> bool {
        self.table.lock().unwrap().overlapped
    }
}

impl ThreadControl for FakeThreads {
    fn thread_ids(&self, pid: u32) -> Result<Vec<u32>, PlatformError> {
        let table = self.table.lock().unwrap();
        Ok(table.processes.get(&pid).cloned().unwrap_or_default())
    }

    fn set_thread_suspended(&self, thread: u32, suspend: bool) -> Result<(), PlatformError> {
        let mut table = self.table.lock().unwrap();
        if table.dead.contains(&thread) {
            return Err(PlatformError::Os {
                call: "OpenThread",
                code: 87,
            });
        }
        if suspend {
            let owner = table.owner(thread);
            if table.suspended.iter().any(|&t| table.owner(t) != owner) {
                table.overlapped = true;
            }
            table.suspended.insert(thread);
            record(&self.journal, Call::SuspendThread(thread));
        } else {
            table.suspended.remove(&thread);
            record(&self.journal, Call::ResumeThread(thread));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Holds every delay until released, to observe a replay in flight.
#[derive(Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn release(&self) {
        let (open, cvar) = &*self.state;
        *open.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (open, cvar) = &*self.state;
        let _open = cvar.wait_while(open.lock().unwrap(), |open| !*open).unwrap();
    }
}

/// Records delays instead of sleeping; jitter is always the range minimum.
struct FakeTiming {
    journal: Journal,
    gate: Arc<Mutex<Option<Gate>>>,
}

impl Timing for FakeTiming {
    fn delay(&mut self, duration: Duration) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        record(&self.journal, Call::Delay(duration));
    }

    fn jitter(&mut self, range_ms: RangeInclusive<u64>) -> Duration {
        Duration::from_millis(*range_ms.start())
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

pub struct FakeBackend {
    journal: Journal,
    slot: Arc<Mutex<HookSlot>>,
    gate: Arc<Mutex<Option<Gate>>>,
    pub keyboard: Arc<FakeKeyboard>,
    pub threads: Arc<FakeThreads>,
}

impl FakeBackend {
    pub const FOREGROUND_THREAD: u32 = 77;

    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            keyboard: Arc::new(FakeKeyboard {
                journal: journal.clone(),
                state: Mutex::new(KeyboardState::default()),
            }),
            threads: Arc::new(FakeThreads {
                journal: journal.clone(),
                table: Mutex::new(ThreadTable::default()),
            }),
            slot: Arc::default(),
            gate: Arc::default(),
            journal,
        }
    }

    pub fn timing(&self) -> Box<dyn Timing> {
        Box::new(FakeTiming {
            journal: self.journal.clone(),
            gate: self.gate.clone(),
        })
    }

    /// A controller wired to these fakes with the default hotkey and pacing.
    pub fn controller(&self, own_pid: u32) -> PauseController {
        let backend = Backend {
            capture: Box::new(FakeCapture {
                journal: self.journal.clone(),
                slot: self.slot.clone(),
            }),
            keyboard: self.keyboard.clone(),
            threads: self.threads.clone(),
        };
        let replay = ReplayEngine::new(self.keyboard.clone(), self.timing(), ReplayTiming::default());
        PauseController::new(backend, Hotkey::default(), replay, own_pid)
    }

    /// Feeds a physical key event through the installed hook, if any.
    pub fn press(&self, vk: u16, direction: KeyDirection) -> HookVerdict {
        let callback = self.slot.lock().unwrap().callback.clone();
        match callback {
            Some(callback) => callback(&RawKeyEvent::physical(vk, direction)),
            None => HookVerdict::Forward,
        }
    }

    /// Delays block until the returned gate is released.
    pub fn block_timing(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn fail_capture_start(&self) {
        self.slot.lock().unwrap().fail_start = true;
    }

    pub fn capture_active(&self) -> bool {
        self.slot.lock().unwrap().callback.is_some()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<SyntheticKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn suspended_threads(&self) -> Vec<u32> {
        self.threads
            .table
            .lock()
            .unwrap()
            .suspended
            .iter()
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Process-wide `log` sink keeping each record with its emitting thread,
/// so parallel tests only see their own output.
struct RecordingLogger {
    records: Mutex<Vec<(ThreadId, Level, String)>>,
}

static LOGGER: RecordingLogger = RecordingLogger {
    records: Mutex::new(Vec::new()),
};

impl Log for RecordingLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let entry = (thread::current().id(), record.level(), record.args().to_string());
        self.records.lock().unwrap().push(entry);
    }

    fn flush(&self) {}
}

/// Installs the recording logger once per test binary. Only records at
/// info and above are kept.
pub fn record_logs() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in tests");
        log::set_max_level(LevelFilter::Info);
    });
}

/// Removes and returns the records emitted so far by the calling thread.
pub fn take_thread_logs() -> Vec<(Level, String)> {
    let me = thread::current().id();
    let mut records = LOGGER.records.lock().unwrap();
    let (mine, rest): (Vec<_>, Vec<_>) = records.drain(..).partition(|(id, _, _)| *id == me);
    *records = rest;
    mine.into_iter().map(|(_, level, msg)| (level, msg)).collect()
}
