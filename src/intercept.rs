//! Per-event classification for the keyboard hook.
//!
//! While a session exists every physical key is either forwarded (the
//! toggle hotkey), turned into a control transition (Escape cancels, Enter
//! accepts), or recorded and suppressed. Without a session everything is
//! forwarded.
//!
//! Classification runs inline in the system input path: no I/O, no
//! sleeping, and the only allocation is the capture log outgrowing its
//! reserved capacity.

use crate::keys::{Hotkey, Modifiers, VK_ESCAPE, VK_RETURN};
use crate::platform::{KeyDirection, RawKeyEvent};
use crate::session::PauseSession;

/// Outcome of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the event on untouched.
    Forward,
    /// Swallow the event; it may or may not have been recorded.
    Suppress,
    /// Escape pressed while armed: end the session and discard the capture.
    Cancel,
    /// Enter pressed while armed: end the session and replay the capture.
    Accept,
}

#[derive(Debug)]
pub struct Interceptor {
    hotkey: Hotkey,
    /// Trigger key whose release must be swallowed when it arrives.
    release_latch: Option<u16>,
}

impl Interceptor {
    pub fn new(hotkey: Hotkey) -> Self {
        Self {
            hotkey,
            release_latch: None,
        }
    }

    /// Drops a latched trigger release unless that key is still held.
    ///
    /// Call before a new session starts: a trigger released after its
    /// session's hook was removed never reaches `classify`.
    pub fn clear_stale_latch(&mut self, is_held: impl Fn(u16) -> bool) {
        if let Some(vk) = self.release_latch {
            if !is_held(vk) {
                self.release_latch = None;
            }
        }
    }

    /// Classifies `event` against the current session.
    ///
    /// `live_modifiers` is only consulted for the hotkey's own key. On
    /// `Cancel`/`Accept` the triggers are already disarmed; the caller runs
    /// the transition and suppresses the event.
    pub fn classify(
        &mut self,
        session: Option<&mut PauseSession>,
        event: &RawKeyEvent,
        live_modifiers: impl FnOnce() -> Modifiers,
    ) -> Decision {
        // Our own replayed or cleared input.
        if event.injected {
            return Decision::Forward;
        }

        let Some(session) = session else {
            return Decision::Forward;
        };

        if event.direction == KeyDirection::Up && self.release_latch == Some(event.vk) {
            self.release_latch = None;
            return Decision::Suppress;
        }

        // The OS delivers the hotkey itself; never swallow it.
        if event.vk == self.hotkey.vk && self.hotkey.modifiers_match(live_modifiers()) {
            return Decision::Forward;
        }

        match (event.vk, event.direction) {
            (VK_ESCAPE, KeyDirection::Down) if session.cancel_armed => {
                session.disarm();
                self.release_latch = Some(VK_ESCAPE);
                return Decision::Cancel;
            }
            (VK_ESCAPE, KeyDirection::Up) if session.cancel_armed => {
                session.cancel_armed = false;
                return Decision::Suppress;
            }
            (VK_RETURN, KeyDirection::Down) if session.accept_armed => {
                session.disarm();
                self.release_latch = Some(VK_RETURN);
                return Decision::Accept;
            }
            (VK_RETURN, KeyDirection::Up) if session.accept_armed => {
                session.accept_armed = false;
                return Decision::Suppress;
            }
            _ => {}
        }

        session.record(event);
        log::trace!("intercept: captured {:#04x} {:?}", event.vk, event.direction);
        Decision::Suppress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{VK_CONTROL, VK_P};

    fn down(vk: u16) -> RawKeyEvent {
        RawKeyEvent::physical(vk, KeyDirection::Down)
    }

    fn up(vk: u16) -> RawKeyEvent {
        RawKeyEvent::physical(vk, KeyDirection::Up)
    }

    fn no_mods() -> Modifiers {
        Modifiers::NONE
    }

    fn hotkey_mods() -> Modifiers {
        Modifiers::CONTROL | Modifiers::ALT
    }

    fn logged(session: &PauseSession) -> Vec<(u16, KeyDirection)> {
        session
            .log
            .events()
            .iter()
            .map(|e| (e.vk, e.direction))
            .collect()
    }

    #[test]
    fn forwards_everything_without_a_session() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        for event in [down(0x41), up(0x41), down(VK_ESCAPE), down(VK_RETURN)] {
            assert_eq!(interceptor.classify(None, &event, no_mods), Decision::Forward);
        }
    }

    #[test]
    fn injected_events_pass_through_untouched() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);
        let mut event = down(VK_ESCAPE);
        event.injected = true;

        assert_eq!(
            interceptor.classify(Some(&mut session), &event, no_mods),
            Decision::Forward
        );
        assert!(session.cancel_armed);
        assert!(session.log.is_empty());
    }

    #[test]
    fn hotkey_with_exact_modifiers_is_forwarded() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        assert_eq!(
            interceptor.classify(Some(&mut session), &down(VK_P), hotkey_mods),
            Decision::Forward
        );
        assert_eq!(
            interceptor.classify(Some(&mut session), &up(VK_P), hotkey_mods),
            Decision::Forward
        );
        assert!(session.log.is_empty());
    }

    #[test]
    fn hotkey_key_without_modifiers_is_captured() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        assert_eq!(
            interceptor.classify(Some(&mut session), &down(VK_P), || Modifiers::CONTROL),
            Decision::Suppress
        );
        assert_eq!(logged(&session), vec![(VK_P, KeyDirection::Down)]);
    }

    #[test]
    fn live_modifiers_are_only_read_for_the_hotkey_key() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);
        let decision = interceptor.classify(Some(&mut session), &down(0x41), || {
            panic!("modifier state queried for an unrelated key")
        });
        assert_eq!(decision, Decision::Suppress);
    }

    #[test]
    fn ordinary_keys_are_recorded_and_suppressed() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        for event in [down(VK_CONTROL), down(0x41), up(0x41)] {
            assert_eq!(
                interceptor.classify(Some(&mut session), &event, no_mods),
                Decision::Suppress
            );
        }
        assert_eq!(
            logged(&session),
            vec![
                (VK_CONTROL, KeyDirection::Down),
                (0x41, KeyDirection::Down),
                (0x41, KeyDirection::Up),
            ]
        );
        assert_eq!(session.held.iter().copied().collect::<Vec<_>>(), vec![VK_CONTROL]);
    }

    #[test]
    fn escape_down_cancels_and_is_not_recorded() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        assert_eq!(
            interceptor.classify(Some(&mut session), &down(VK_ESCAPE), no_mods),
            Decision::Cancel
        );
        assert!(!session.cancel_armed);
        assert!(!session.accept_armed);
        assert!(session.log.is_empty());
    }

    #[test]
    fn trigger_release_is_swallowed_after_disarm() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        interceptor.classify(Some(&mut session), &down(VK_ESCAPE), no_mods);
        assert_eq!(
            interceptor.classify(Some(&mut session), &up(VK_ESCAPE), no_mods),
            Decision::Suppress
        );
        assert!(session.log.is_empty());

        // The latch is single-use: a later Escape release is ordinary input.
        interceptor.classify(Some(&mut session), &up(VK_ESCAPE), no_mods);
        assert_eq!(logged(&session), vec![(VK_ESCAPE, KeyDirection::Up)]);
    }

    #[test]
    fn enter_release_after_accept_is_swallowed_in_the_next_session() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut first = PauseSession::new(1);
        assert_eq!(
            interceptor.classify(Some(&mut first), &down(VK_RETURN), no_mods),
            Decision::Accept
        );

        let mut second = PauseSession::new(2);
        assert_eq!(
            interceptor.classify(Some(&mut second), &up(VK_RETURN), no_mods),
            Decision::Suppress
        );
        assert!(second.log.is_empty());
        assert!(second.accept_armed);
    }

    #[test]
    fn stale_latch_is_dropped_once_the_trigger_is_up() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut first = PauseSession::new(1);
        interceptor.classify(Some(&mut first), &down(VK_ESCAPE), no_mods);

        interceptor.clear_stale_latch(|_| false);

        let mut second = PauseSession::new(2);
        assert_eq!(
            interceptor.classify(Some(&mut second), &up(VK_ESCAPE), no_mods),
            Decision::Suppress
        );
        assert!(!second.cancel_armed);
        assert!(second.accept_armed);
    }

    #[test]
    fn latch_survives_while_the_trigger_is_still_held() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut first = PauseSession::new(1);
        interceptor.classify(Some(&mut first), &down(VK_ESCAPE), no_mods);

        interceptor.clear_stale_latch(|vk| vk == VK_ESCAPE);

        let mut second = PauseSession::new(2);
        assert_eq!(
            interceptor.classify(Some(&mut second), &up(VK_ESCAPE), no_mods),
            Decision::Suppress
        );
        assert!(second.cancel_armed);
    }

    #[test]
    fn stray_escape_release_disarms_cancel_without_recording() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        assert_eq!(
            interceptor.classify(Some(&mut session), &up(VK_ESCAPE), no_mods),
            Decision::Suppress
        );
        assert!(!session.cancel_armed);
        assert!(session.accept_armed);
        assert!(session.log.is_empty());

        // Disarmed: Escape is now recorded like any other key.
        assert_eq!(
            interceptor.classify(Some(&mut session), &down(VK_ESCAPE), no_mods),
            Decision::Suppress
        );
        assert_eq!(logged(&session), vec![(VK_ESCAPE, KeyDirection::Down)]);
    }

    #[test]
    fn accept_keeps_keys_typed_before_enter() {
        let mut interceptor = Interceptor::new(Hotkey::default());
        let mut session = PauseSession::new(1);

        interceptor.classify(Some(&mut session), &down(0x48), no_mods);
        interceptor.classify(Some(&mut session), &up(0x48), no_mods);
        assert_eq!(
            interceptor.classify(Some(&mut session), &down(VK_RETURN), no_mods),
            Decision::Accept
        );
        assert_eq!(
            logged(&session),
            vec![(0x48, KeyDirection::Down), (0x48, KeyDirection::Up)]
        );
    }
}
