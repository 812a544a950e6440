//! Pause session state: the suspended target, the keys captured while it is
//! suspended, and the armed accept/cancel triggers.

use std::collections::BTreeSet;

use crate::platform::{KeyDirection, RawKeyEvent, SyntheticKey};

/// Capacity reserved up front so recording from the hook rarely allocates.
const LOG_CAPACITY: usize = 256;

/// Virtual keys physically held at the end of capture, in VK order.
pub type HeldKeySet = BTreeSet<u16>;

/// One key event recorded while the target was suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedEvent {
    pub vk: u16,
    pub direction: KeyDirection,
    pub extended: bool,
    /// Position in the log, starting at 0.
    pub seq: u32,
}

impl CapturedEvent {
    pub fn to_synthetic(self) -> SyntheticKey {
        SyntheticKey {
            vk: self.vk,
            direction: self.direction,
            extended: self.extended,
        }
    }
}

/// Append-only, ordered record of captured events.
#[derive(Debug, Default)]
pub struct CaptureLog {
    events: Vec<CapturedEvent>,
}

impl CaptureLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, vk: u16, direction: KeyDirection, extended: bool) {
        let seq = self.events.len() as u32;
        self.events.push(CapturedEvent {
            vk,
            direction,
            extended,
            seq,
        });
    }

    pub fn events(&self) -> &[CapturedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Extended flag of the most recent Down recorded for `vk`.
    pub fn last_down_extended(&self, vk: u16) -> bool {
        self.events
            .iter()
            .rev()
            .find(|e| e.vk == vk && e.direction == KeyDirection::Down)
            .is_some_and(|e| e.extended)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// The single pause in progress.
///
/// Exists exactly while `target` is suspended. Owned by the controller.
#[derive(Debug)]
pub struct PauseSession {
    pub target: u32,
    pub log: CaptureLog,
    pub held: HeldKeySet,
    pub cancel_armed: bool,
    pub accept_armed: bool,
}

impl PauseSession {
    /// A fresh session with both triggers armed.
    pub fn new(target: u32) -> Self {
        Self {
            target,
            log: CaptureLog::with_capacity(LOG_CAPACITY),
            held: HeldKeySet::new(),
            cancel_armed: true,
            accept_armed: true,
        }
    }

    /// Appends `event` to the log and tracks it in the held set.
    pub fn record(&mut self, event: &RawKeyEvent) {
        match event.direction {
            KeyDirection::Down => self.held.insert(event.vk),
            KeyDirection::Up => self.held.remove(&event.vk),
        };
        self.log.push(event.vk, event.direction, event.extended);
    }

    pub fn disarm(&mut self) {
        self.cancel_armed = false;
        self.accept_armed = false;
    }

    /// Ends the session, handing over what was captured for replay.
    pub fn into_capture(self) -> (CaptureLog, HeldKeySet) {
        (self.log, self.held)
    }
}
