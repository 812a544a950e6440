//! Delivers captured keystrokes to the resumed foreground window.
//!
//! The engine first presses every key still held when the pause ended, so
//! the target sees the same chord the user is holding, then replays the log
//! in recorded order with randomized gaps. Injection goes through
//! `SendInput` while attached to the foreground thread's input queue.
//!
//! Must only run after the target has been resumed and the hook removed,
//! otherwise the target cannot process the input or the hook recaptures it.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::ReplayTiming;
use crate::keys;
use crate::platform::{InputAttachment, KeyDirection, Keyboard, SyntheticKey};
use crate::session::{CaptureLog, HeldKeySet};

/// Pause after pressing the held chord, before the timed log starts.
const CHORD_SETTLE: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Source of delays between synthesized events.
pub trait Timing: Send {
    fn delay(&mut self, duration: Duration);

    /// A random gap drawn uniformly from `range_ms` milliseconds.
    fn jitter(&mut self, range_ms: RangeInclusive<u64>) -> Duration;
}

/// Real sleeps and `rand`-drawn jitter.
pub struct RandomTiming;

impl Timing for RandomTiming {
    fn delay(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn jitter(&mut self, range_ms: RangeInclusive<u64>) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(range_ms))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Counts from one delivery, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Keys pressed to re-establish the held chord.
    pub held: usize,
    /// Log entries injected.
    pub replayed: usize,
    /// Injections the OS rejected.
    pub failed: usize,
}

pub struct ReplayEngine {
    keyboard: Arc<dyn Keyboard>,
    timing: Box<dyn Timing>,
    config: ReplayTiming,
}

impl ReplayEngine {
    pub fn new(keyboard: Arc<dyn Keyboard>, timing: Box<dyn Timing>, config: ReplayTiming) -> Self {
        Self {
            keyboard,
            timing,
            config,
        }
    }

    /// Sends key-ups for every key physically down right now.
    ///
    /// Runs before the target is suspended so no key stays stuck down in it
    /// for the length of the pause. Returns the number of keys released.
    pub fn release_held_keys(&mut self) -> usize {
        let held: Vec<u16> = (1..=0xFE)
            .filter(|&vk| !keys::is_mouse_button(vk) && self.keyboard.is_key_down(vk))
            .collect();
        if held.is_empty() {
            return 0;
        }

        let attachment = InputAttachment::foreground(self.keyboard.as_ref());
        if attachment.is_some() {
            self.timing.delay(self.config.attach_settle());
        }

        for &vk in &held {
            self.inject(SyntheticKey::up(vk, keys::is_extended(vk)));
        }
        drop(attachment);
        held.len()
    }

    /// Replays `log` after pressing the keys in `held`, then clears both.
    pub fn deliver(&mut self, log: &mut CaptureLog, held: &mut HeldKeySet) -> ReplayReport {
        let mut report = ReplayReport::default();
        if log.is_empty() && held.is_empty() {
            log::info!("replay: nothing to deliver");
            return report;
        }

        if held.is_empty() {
            log::info!("replay: delivering {} events", log.len());
        } else {
            log::info!(
                "replay: delivering {} events (chord of {} keys)",
                log.len(),
                held.len()
            );
        }

        // Give the resumed message loop time to come back.
        self.timing.delay(self.config.settle());

        let attachment = InputAttachment::foreground(self.keyboard.as_ref());
        if let Some(attachment) = &attachment {
            log::debug!("replay: attached to input queue of thread {}", attachment.thread());
            self.timing.delay(self.config.attach_settle());
        }

        for &vk in held.iter() {
            let key = SyntheticKey::down(vk, log.last_down_extended(vk));
            report.held += 1;
            if !self.inject(key) {
                report.failed += 1;
            }
        }
        if !held.is_empty() {
            self.timing.delay(CHORD_SETTLE);
        }

        let events = log.events();
        for (i, event) in events.iter().enumerate() {
            log::trace!("replay: #{} {:#04x} {:?}", event.seq, event.vk, event.direction);
            report.replayed += 1;
            if !self.inject(event.to_synthetic()) {
                report.failed += 1;
            }
            if let Some(next) = events.get(i + 1) {
                let range = if event.vk == next.vk
                    && event.direction == KeyDirection::Down
                    && next.direction == KeyDirection::Up
                {
                    self.config.keypress_range()
                } else {
                    self.config.gap_range()
                };
                let gap = self.timing.jitter(range);
                self.timing.delay(gap);
            }
        }

        drop(attachment);
        log.clear();
        held.clear();

        log::info!(
            "replay: finished ({} replayed, {} held, {} rejected)",
            report.replayed,
            report.held,
            report.failed
        );
        report
    }

    /// Injects one event; failures are logged and reported, never retried.
    fn inject(&self, key: SyntheticKey) -> bool {
        match self.keyboard.send(key) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("replay: injecting {:#04x} {:?} failed: {e}", key.vk, key.direction);
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
