//! Key and mouse delays.

use std::time::Duration;

use super::types::SendMode;
use super::{SendSession, Sender};
use crate::platform::Platform;

/// Mouse delays shorter than this are slept precisely rather than waited out.
pub const MOUSE_TRUE_SLEEP_THRESHOLD_MS: i32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayAction {
    None,
    /// Delay marker inside a Play batch.
    Marker(u32),
    /// Uninterruptible sleep.
    Sleep(Duration),
    /// Cooperative wait.
    Wait(Duration),
}

/// What a key delay of `delay` ms amounts to in `mode`.
///
/// Negative delays are skipped. Input batches cannot hold delays at all; Play
/// batches carry them as markers, zero included.
pub fn key_delay_action(mode: SendMode, delay: i32) -> DelayAction {
    if delay < 0 {
        return DelayAction::None;
    }
    match mode {
        SendMode::Input | SendMode::InputThenPlay => DelayAction::None,
        SendMode::Play => DelayAction::Marker(delay as u32),
        SendMode::Event if delay == 0 => DelayAction::None,
        SendMode::Event => DelayAction::Sleep(Duration::from_millis(delay as u64)),
    }
}

pub fn mouse_delay_action(mode: SendMode, delay: i32) -> DelayAction {
    match key_delay_action(mode, delay) {
        DelayAction::Sleep(duration) if delay >= MOUSE_TRUE_SLEEP_THRESHOLD_MS => {
            DelayAction::Wait(duration)
        }
        other => other,
    }
}

impl<P: Platform> Sender<P> {
    /// Waits after a key; `None` uses the session's key delay.
    pub(crate) fn do_key_delay(&mut self, session: &mut SendSession, delay: Option<i32>) {
        let delay = delay.unwrap_or(session.key_delay);
        let action = key_delay_action(session.mode, delay);
        self.apply_delay(session, action);
    }

    /// Waits after a mouse event; `None` uses the session's mouse delay.
    pub(crate) fn do_mouse_delay(&mut self, session: &mut SendSession, delay: Option<i32>) {
        let delay = delay.unwrap_or(session.mouse_delay);
        let action = mouse_delay_action(session.mode, delay);
        self.apply_delay(session, action);
    }

    fn apply_delay(&mut self, session: &mut SendSession, action: DelayAction) {
        match action {
            DelayAction::None => {}
            DelayAction::Marker(ms) => self.emit_delay(session, ms),
            DelayAction::Sleep(duration) => self.platform.sleep(duration),
            DelayAction::Wait(duration) => self.platform.wait(duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_delay_is_skipped() {
        for mode in [SendMode::Event, SendMode::Input, SendMode::Play] {
            assert_eq!(key_delay_action(mode, -1), DelayAction::None);
            assert_eq!(mouse_delay_action(mode, -1), DelayAction::None);
        }
    }

    #[test]
    fn test_zero_only_marks_batches() {
        assert_eq!(key_delay_action(SendMode::Event, 0), DelayAction::None);
        assert_eq!(key_delay_action(SendMode::Input, 0), DelayAction::None);
        assert_eq!(key_delay_action(SendMode::Play, 0), DelayAction::Marker(0));
    }

    #[test]
    fn test_event_mode_sleeps() {
        assert_eq!(
            key_delay_action(SendMode::Event, 20),
            DelayAction::Sleep(Duration::from_millis(20))
        );
        assert_eq!(key_delay_action(SendMode::Input, 20), DelayAction::None);
        assert_eq!(key_delay_action(SendMode::Play, 20), DelayAction::Marker(20));
    }

    #[test]
    fn test_mouse_sleep_threshold() {
        assert_eq!(
            mouse_delay_action(SendMode::Event, 10),
            DelayAction::Sleep(Duration::from_millis(10))
        );
        assert_eq!(
            mouse_delay_action(SendMode::Event, 11),
            DelayAction::Wait(Duration::from_millis(11))
        );
        assert_eq!(mouse_delay_action(SendMode::Play, 30), DelayAction::Marker(30));
    }
}
