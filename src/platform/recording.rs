//! Headless platform that records what the engine injects.
//!
//! Key and lock state, the cursor and the clock are simulated from the
//! injected events, so successive sends observe each other the way they
//! would on a real desktop.

use std::time::Duration;

use super::{HookOracle, InputSink};
use crate::error::{Error, Result};
use crate::keys;
use crate::sender::types::*;

/// Layout reported while [`RecordingPlatform::altgr`] is set.
pub const ALTGR_LAYOUT: LayoutId = LayoutId(0x0407_0407);
pub const US_LAYOUT: LayoutId = LayoutId(0x0409_0409);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Input,
    Play,
}

/// One `send_input` or `play` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    pub backend: Backend,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct RecordingPlatform {
    /// Pretend a keyboard hook is installed.
    pub keyboard_hook: bool,
    /// Modifiers the user is physically holding.
    pub physical: ModifierMask,
    /// Focused layout has AltGr.
    pub altgr: bool,
    pub buttons_swapped: bool,
    pub foreign_hooks: bool,
    /// Every injection call fails.
    pub fail_injection: bool,
    /// Window/client origin for non-screen coordinate modes.
    pub origin: Point,
    pub own_window: Option<WindowId>,

    events: Vec<EventRecord>,
    flushes: Vec<Flush>,
    sleeps: Vec<Duration>,
    waits: Vec<Duration>,
    key_down: [bool; 256],
    toggled: [bool; 256],
    cursor: Point,
    clock: Duration,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            keyboard_hook: false,
            physical: ModifierMask::empty(),
            altgr: false,
            buttons_swapped: false,
            foreign_hooks: false,
            fail_injection: false,
            origin: Point::default(),
            own_window: None,
            events: Vec::new(),
            flushes: Vec::new(),
            sleeps: Vec::new(),
            waits: Vec::new(),
            key_down: [false; 256],
            toggled: [false; 256],
            cursor: Point::default(),
            clock: Duration::ZERO,
        }
    }

    /// Everything injected so far, in order, without delay markers.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn key_events(&self) -> Vec<KeyRecord> {
        self.events.iter().filter_map(EventRecord::as_key).copied().collect()
    }

    pub fn mouse_events(&self) -> Vec<MouseRecord> {
        self.events.iter().filter_map(EventRecord::as_mouse).copied().collect()
    }

    pub fn flushes(&self) -> &[Flush] {
        &self.flushes
    }

    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Forgets recorded events and calls; simulated state is kept.
    pub fn clear(&mut self) {
        self.events.clear();
        self.flushes.clear();
        self.sleeps.clear();
        self.waits.clear();
    }

    pub fn set_toggled(&mut self, vk: u8, on: bool) {
        self.toggled[vk as usize] = on;
    }

    pub fn set_cursor(&mut self, at: Point) {
        self.cursor = at;
    }

    pub fn advance(&mut self, duration: Duration) {
        self.clock += duration;
    }

    fn apply(&mut self, event: &EventRecord) {
        match event {
            EventRecord::Key(key) if key.unicode => {}
            EventRecord::Key(key) => {
                let vk = match key.vk {
                    keys::VK_SHIFT | keys::VK_CONTROL | keys::VK_MENU if key.sc != 0 => {
                        keys::sc_to_vk(key.sc)
                    }
                    vk => vk,
                };
                let idx = vk as usize;
                if !key.key_up
                    && !self.key_down[idx]
                    && matches!(vk, keys::VK_CAPITAL | keys::VK_NUMLOCK | keys::VK_SCROLL)
                {
                    self.toggled[idx] = !self.toggled[idx];
                }
                self.key_down[idx] = !key.key_up;
                if self.altgr && vk == keys::VK_RMENU {
                    self.key_down[keys::VK_LCONTROL as usize] = !key.key_up;
                }
            }
            EventRecord::Mouse(mouse) => {
                if mouse.flags.contains(MouseFlags::MOVE | MouseFlags::ABSOLUTE) {
                    self.cursor = Point::new(mouse.x, mouse.y);
                } else if mouse.flags.contains(MouseFlags::MOVE) {
                    self.cursor = Point::new(
                        self.cursor.x.saturating_add(mouse.x),
                        self.cursor.y.saturating_add(mouse.y),
                    );
                }
            }
            EventRecord::Delay(ms) => self.clock += Duration::from_millis(*ms as u64),
        }
    }

    fn layout(&self) -> LayoutId {
        if self.altgr { ALTGR_LAYOUT } else { US_LAYOUT }
    }
}

impl HookOracle for RecordingPlatform {
    fn is_key_down_async(&self, vk: u8) -> bool {
        self.key_down[vk as usize] || self.physical.intersects(ModifierMask::from_vk(vk))
    }

    fn is_key_toggled(&self, vk: u8) -> bool {
        self.toggled[vk as usize]
    }

    fn has_keyboard_hook(&self) -> bool {
        self.keyboard_hook
    }

    fn physical_modifiers(&self) -> ModifierMask {
        self.physical
    }

    fn other_hooks_present(&self) -> bool {
        self.foreign_hooks
    }

    fn map_vk_to_sc(&self, vk: u8, _layout: LayoutId) -> u16 {
        keys::vk_to_sc(vk)
    }

    fn map_sc_to_vk(&self, sc: u16, _layout: LayoutId) -> u8 {
        keys::sc_to_vk(sc)
    }

    fn focused_layout(&self, _target: Option<WindowId>) -> LayoutId {
        self.layout()
    }

    fn layout_has_altgr(&self, layout: LayoutId) -> bool {
        layout == ALTGR_LAYOUT
    }

    fn char_to_vk(&self, ch: char, layout: LayoutId) -> Option<(u8, ModifierMask)> {
        if layout == ALTGR_LAYOUT && ch == '€' {
            return Some((0x45, ModifierMask::LCONTROL | ModifierMask::LALT));
        }
        keys::us_char_to_vk(ch).map(|(vk, shift)| {
            let mods = if shift {
                ModifierMask::LSHIFT
            } else {
                ModifierMask::empty()
            };
            (vk, mods)
        })
    }

    fn buttons_swapped(&self) -> bool {
        self.buttons_swapped
    }

    fn cursor_pos(&self) -> Point {
        self.cursor
    }

    fn coord_origin(&self, mode: CoordMode, _target: Option<WindowId>) -> Point {
        match mode {
            CoordMode::Screen => Point::default(),
            CoordMode::Window | CoordMode::Client => self.origin,
        }
    }

    fn is_own_window(&self, window: WindowId) -> bool {
        self.own_window == Some(window)
    }

    fn now(&self) -> Duration {
        self.clock
    }
}

impl InputSink for RecordingPlatform {
    fn send_input(&mut self, events: &[EventRecord]) -> Result<usize> {
        if self.fail_injection {
            return Err(Error::Platform("injection blocked".into()));
        }
        for event in events {
            self.apply(event);
        }
        self.events.extend(events.iter().filter(|e| !matches!(e, EventRecord::Delay(_))));
        self.flushes.push(Flush {
            backend: Backend::Input,
            len: events.len(),
        });
        Ok(events.len())
    }

    fn play(&mut self, events: &[EventRecord]) -> Result<()> {
        if self.fail_injection {
            return Err(Error::Platform("playback blocked".into()));
        }
        for event in events {
            self.apply(event);
        }
        self.events.extend(events.iter().filter(|e| !matches!(e, EventRecord::Delay(_))));
        self.flushes.push(Flush {
            backend: Backend::Play,
            len: events.len(),
        });
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.clock += duration;
    }

    fn wait(&mut self, duration: Duration) {
        self.waits.push(duration);
        self.clock += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(vk: u8, sc: u16, key_up: bool) -> EventRecord {
        EventRecord::Key(KeyRecord {
            vk,
            sc,
            key_up,
            extended: false,
            unicode: false,
            extra_info: 0,
        })
    }

    #[test]
    fn test_tracks_key_state_and_toggles() {
        let mut platform = RecordingPlatform::new();
        platform
            .send_input(&[key(keys::VK_CAPITAL, 0x3A, false), key(keys::VK_CAPITAL, 0x3A, true)])
            .unwrap();
        assert!(platform.is_key_toggled(keys::VK_CAPITAL));
        assert!(!platform.is_key_down_async(keys::VK_CAPITAL));
    }

    #[test]
    fn test_neutral_modifiers_resolve_by_scan_code() {
        let mut platform = RecordingPlatform::new();
        platform.play(&[key(keys::VK_SHIFT, keys::SC_RSHIFT, false)]).unwrap();
        assert!(platform.is_key_down_async(keys::VK_RSHIFT));
        assert!(!platform.is_key_down_async(keys::VK_LSHIFT));
    }

    #[test]
    fn test_delay_markers_advance_clock() {
        let mut platform = RecordingPlatform::new();
        platform.play(&[EventRecord::Delay(25)]).unwrap();
        assert_eq!(platform.now(), Duration::from_millis(25));
        assert!(platform.events().is_empty());
        assert_eq!(platform.flushes(), &[Flush { backend: Backend::Play, len: 1 }]);
    }

    #[test]
    fn test_physical_modifiers_show_as_down() {
        let mut platform = RecordingPlatform::new();
        platform.physical = ModifierMask::RCONTROL;
        assert!(platform.is_key_down_async(keys::VK_RCONTROL));
        assert!(!platform.is_key_down_async(keys::VK_LCONTROL));
    }

    #[test]
    fn test_failing_injection() {
        let mut platform = RecordingPlatform::new();
        platform.fail_injection = true;
        assert!(platform.send_input(&[key(0x41, 0x1E, false)]).is_err());
        assert!(platform.events().is_empty());
    }
}
