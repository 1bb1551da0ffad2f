//! Mouse clicks, drags, wheel turns and moves.

use tracing::debug;

use super::parsing::ClickSpec;
use super::types::*;
use super::{SendSession, Sender};
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Smallest per-axis step of an incremental move, in pixels.
pub const INCR_MOUSE_MIN_SPEED: i32 = 32;
pub const MAX_MOUSE_SPEED: i32 = 100;
/// Wheel distance of one notch.
pub const WHEEL_DELTA: i32 = 120;

/// Positions visited by an incremental move, excluding the start.
///
/// Each axis advances by `remaining / speed`, at least
/// [`INCR_MOUSE_MIN_SPEED`], and never past the target, so the path always
/// ends exactly at `to`.
#[derive(Debug, Clone)]
pub struct IncrementalPath {
    at: Point,
    to: Point,
    speed: i32,
}

impl IncrementalPath {
    pub fn new(from: Point, to: Point, speed: i32) -> Self {
        Self {
            at: from,
            to,
            speed: speed.max(1),
        }
    }

    fn advance(from: i32, to: i32, speed: i32) -> i32 {
        let delta = (to.abs_diff(from) / speed as u32).max(INCR_MOUSE_MIN_SPEED as u32);
        let delta = i32::try_from(delta).unwrap_or(i32::MAX);
        if from < to {
            from.saturating_add(delta).min(to)
        } else if from > to {
            from.saturating_sub(delta).max(to)
        } else {
            from
        }
    }
}

impl Iterator for IncrementalPath {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.at == self.to {
            return None;
        }
        self.at = Point::new(
            Self::advance(self.at.x, self.to.x, self.speed),
            Self::advance(self.at.y, self.to.y, self.speed),
        );
        Some(self.at)
    }
}

/// Down/up flags and event data for a non-wheel button.
fn button_flags(button: MouseButton) -> (MouseFlags, MouseFlags, i32) {
    match button {
        MouseButton::Right => (MouseFlags::RIGHTDOWN, MouseFlags::RIGHTUP, 0),
        MouseButton::Middle => (MouseFlags::MIDDLEDOWN, MouseFlags::MIDDLEUP, 0),
        MouseButton::X1 => (MouseFlags::XDOWN, MouseFlags::XUP, 1),
        MouseButton::X2 => (MouseFlags::XDOWN, MouseFlags::XUP, 2),
        _ => (MouseFlags::LEFTDOWN, MouseFlags::LEFTUP, 0),
    }
}

impl<P: Platform> Sender<P> {
    /// Moves the cursor; `relative` offsets from the current position.
    pub fn mouse_move(&mut self, x: i32, y: i32, speed: Option<i32>, relative: bool) -> Result<()> {
        let mode = self.settings.send_mode;
        let mut session = self.open_session(mode, SendRawMode::NotRaw, None);
        self.move_mouse(&mut session, x, y, speed, relative);
        self.flush_batch(&mut session);
        Ok(())
    }

    /// Clicks, presses or releases a button, or turns the wheel.
    pub fn mouse_click(&mut self, spec: &ClickSpec) -> Result<()> {
        let mode = self.settings.send_mode;
        let mut session = self.open_session(mode, SendRawMode::NotRaw, None);
        let result = self.click(&mut session, spec);
        self.flush_batch(&mut session);
        result
    }

    /// Presses `button` at the start point, moves to `to` and releases.
    ///
    /// A missing start point means the current position.
    pub fn mouse_click_drag(
        &mut self,
        button: MouseButton,
        from: Option<Point>,
        to: Point,
        speed: Option<i32>,
        relative: bool,
    ) -> Result<()> {
        if button.is_wheel() {
            return Err(Error::invalid_value("button", format!("{:?}", button)));
        }
        let mode = self.settings.send_mode;
        let mut session = self.open_session(mode, SendRawMode::NotRaw, None);

        let button = self.physical_button(button);
        let (down, up, data) = button_flags(button);
        if let Some(from) = from {
            self.move_mouse(&mut session, from.x, from.y, speed, relative);
        }
        let at = self.cursor(&session);
        self.emit_mouse(&mut session, down, data, at);
        self.do_mouse_delay(&mut session, None);
        self.move_mouse(&mut session, to.x, to.y, speed, relative);
        let at = self.cursor(&session);
        self.emit_mouse(&mut session, up, data, at);
        self.do_mouse_delay(&mut session, None);

        self.flush_batch(&mut session);
        Ok(())
    }

    pub(crate) fn click(&mut self, session: &mut SendSession, spec: &ClickSpec) -> Result<()> {
        if let (Some(x), Some(y)) = (spec.x, spec.y) {
            self.move_mouse(session, x, y, spec.speed, spec.relative);
        }
        if spec.count == 0 {
            return Ok(());
        }

        if spec.button.is_wheel() {
            let (flags, sign) = match spec.button {
                MouseButton::WheelUp => (MouseFlags::WHEEL, 1),
                MouseButton::WheelDown => (MouseFlags::WHEEL, -1),
                MouseButton::WheelRight => (MouseFlags::HWHEEL, 1),
                _ => (MouseFlags::HWHEEL, -1),
            };
            let data = i32::try_from(spec.count)
                .ok()
                .and_then(|notches| notches.checked_mul(sign * WHEEL_DELTA))
                .ok_or_else(|| Error::invalid_value("count", spec.count))?;
            let at = self.cursor(session);
            self.emit_mouse(session, flags, data, at);
            self.do_mouse_delay(session, None);
            return Ok(());
        }

        let button = self.physical_button(spec.button);
        let (down, up, data) = button_flags(button);
        let at = self.cursor(session);
        match spec.action {
            ClickAction::Down => {
                self.emit_mouse(session, down, data, at);
                self.do_mouse_delay(session, None);
            }
            ClickAction::Up => {
                self.emit_mouse(session, up, data, at);
                self.do_mouse_delay(session, None);
            }
            ClickAction::DownAndUp => {
                for _ in 0..spec.count {
                    self.emit_mouse(session, down, data, at);
                    self.do_mouse_delay(session, None);
                    self.emit_mouse(session, up, data, at);
                    self.do_mouse_delay(session, None);
                }
            }
        }
        Ok(())
    }

    /// Converts coordinates per the coordinate mode, then moves in one step
    /// or incrementally.
    pub(crate) fn move_mouse(
        &mut self,
        session: &mut SendSession,
        x: i32,
        y: i32,
        speed: Option<i32>,
        relative: bool,
    ) {
        let speed = speed
            .unwrap_or(self.settings.default_mouse_speed as i32)
            .clamp(0, MAX_MOUSE_SPEED);
        let from = self.cursor(session);
        let to = if relative {
            Point::new(from.x.saturating_add(x), from.y.saturating_add(y))
        } else {
            let origin = self.platform.coord_origin(self.settings.coord_mode, session.target);
            Point::new(origin.x.saturating_add(x), origin.y.saturating_add(y))
        };
        debug!(?from, ?to, speed, "mouse move");

        if speed == 0 || session.mode == SendMode::Input {
            self.emit_mouse(session, MouseFlags::MOVE | MouseFlags::ABSOLUTE, 0, to);
            self.do_mouse_delay(session, None);
        } else {
            self.incremental_mouse_move(session, from, to, speed);
        }
    }

    /// One absolute move per path step with a mouse delay after each.
    pub(crate) fn incremental_mouse_move(
        &mut self,
        session: &mut SendSession,
        from: Point,
        to: Point,
        speed: i32,
    ) {
        for step in IncrementalPath::new(from, to, speed) {
            self.emit_mouse(session, MouseFlags::MOVE | MouseFlags::ABSOLUTE, 0, step);
            self.do_mouse_delay(session, None);
        }
    }

    /// Current cursor, or where the batch has moved it so far.
    fn cursor(&self, session: &SendSession) -> Point {
        session
            .cursor
            .unwrap_or_else(|| self.platform.cursor_pos())
    }

    /// Left and right trade places when the system has swapped the buttons.
    fn physical_button(&self, button: MouseButton) -> MouseButton {
        if !self.platform.buttons_swapped() {
            return button;
        }
        match button {
            MouseButton::Left => MouseButton::Right,
            MouseButton::Right => MouseButton::Left,
            other => other,
        }
    }
}
