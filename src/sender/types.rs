//! Type definitions shared by the send engine and its platform backends.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::keys;

bitflags! {
    /// Left/right-qualified modifier set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierMask: u8 {
        const LCONTROL = 0x01;
        const RCONTROL = 0x02;
        const LALT = 0x04;
        const RALT = 0x08;
        const LSHIFT = 0x10;
        const RSHIFT = 0x20;
        const LWIN = 0x40;
        const RWIN = 0x80;

        const CONTROL = Self::LCONTROL.bits() | Self::RCONTROL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const WIN = Self::LWIN.bits() | Self::RWIN.bits();
    }
}

impl ModifierMask {
    /// Each single modifier bit with the key that produces it.
    pub const KEYS: [(ModifierMask, u8, u16); 8] = [
        (Self::LCONTROL, keys::VK_LCONTROL, keys::SC_LCONTROL),
        (Self::RCONTROL, keys::VK_RCONTROL, keys::SC_RCONTROL),
        (Self::LALT, keys::VK_LMENU, keys::SC_LALT),
        (Self::RALT, keys::VK_RMENU, keys::SC_RALT),
        (Self::LSHIFT, keys::VK_LSHIFT, keys::SC_LSHIFT),
        (Self::RSHIFT, keys::VK_RSHIFT, keys::SC_RSHIFT),
        (Self::LWIN, keys::VK_LWIN, keys::SC_LWIN),
        (Self::RWIN, keys::VK_RWIN, keys::SC_RWIN),
    ];

    /// Modifier bit for a key; neutral keys map to the left side.
    pub fn from_vk(vk: u8) -> ModifierMask {
        match vk {
            keys::VK_LCONTROL | keys::VK_CONTROL => Self::LCONTROL,
            keys::VK_RCONTROL => Self::RCONTROL,
            keys::VK_LMENU | keys::VK_MENU => Self::LALT,
            keys::VK_RMENU => Self::RALT,
            keys::VK_LSHIFT | keys::VK_SHIFT => Self::LSHIFT,
            keys::VK_RSHIFT => Self::RSHIFT,
            keys::VK_LWIN => Self::LWIN,
            keys::VK_RWIN => Self::RWIN,
            _ => Self::empty(),
        }
    }

    /// Virtual key and scan code of a single modifier bit.
    pub fn key(self) -> Option<(u8, u16)> {
        Self::KEYS
            .iter()
            .find(|(bit, _, _)| *bit == self)
            .map(|&(_, vk, sc)| (vk, sc))
    }

    /// Parses a `^+!#` prefix character into its left-side bit.
    pub fn from_symbol(ch: char) -> Option<ModifierMask> {
        match ch {
            '^' => Some(Self::LCONTROL),
            '+' => Some(Self::LSHIFT),
            '!' => Some(Self::LALT),
            '#' => Some(Self::LWIN),
            _ => None,
        }
    }

    /// Both sides of every class touched by `self`.
    pub fn classes(self) -> ModifierMask {
        let mut out = ModifierMask::empty();
        for class in [Self::CONTROL, Self::ALT, Self::SHIFT, Self::WIN] {
            if self.intersects(class) {
                out |= class;
            }
        }
        out
    }
}

/// Per-send dispatch backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SendMode {
    #[default]
    Event,
    Input,
    Play,
    InputThenPlay,
}

impl SendMode {
    #[inline]
    pub fn is_batch(self) -> bool {
        matches!(self, SendMode::Input | SendMode::Play)
    }
}

impl FromStr for SendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "event" => Ok(SendMode::Event),
            "input" => Ok(SendMode::Input),
            "play" => Ok(SendMode::Play),
            "inputthenplay" => Ok(SendMode::InputThenPlay),
            _ => Err(Error::invalid_value("send_mode", s)),
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendMode::Event => "Event",
            SendMode::Input => "Input",
            SendMode::Play => "Play",
            SendMode::InputThenPlay => "InputThenPlay",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SendRawMode {
    #[default]
    NotRaw,
    /// `^+!#` are literal; `{...}` directives still apply.
    Raw,
    /// Everything is literal.
    RawText,
}

/// Origin used to interpret mouse coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordMode {
    #[default]
    Screen,
    Window,
    Client,
}

impl FromStr for CoordMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "screen" => Ok(CoordMode::Screen),
            "window" | "relative" => Ok(CoordMode::Window),
            "client" => Ok(CoordMode::Client),
            _ => Err(Error::invalid_value("coord_mode", s)),
        }
    }
}

impl fmt::Display for CoordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CoordMode::Screen => "Screen",
            CoordMode::Window => "Window",
            CoordMode::Client => "Client",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventType {
    KeyDown,
    KeyUp,
    KeyDownAndUp,
}

/// Mouse buttons and wheel directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
}

impl MouseButton {
    #[inline]
    pub fn is_wheel(self) -> bool {
        matches!(
            self,
            MouseButton::WheelUp
                | MouseButton::WheelDown
                | MouseButton::WheelLeft
                | MouseButton::WheelRight
        )
    }
}

impl FromStr for MouseButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        keys::mouse_button_name(&s.to_ascii_uppercase())
            .ok_or_else(|| Error::invalid_value("button", s))
    }
}

/// Press/release selection for a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClickAction {
    #[default]
    DownAndUp,
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Opaque top-level window handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// Opaque keyboard layout handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayoutId(pub usize);

bitflags! {
    /// Mouse event flags; values match the Win32 `MOUSEEVENTF_*` constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseFlags: u32 {
        const MOVE = 0x0001;
        const LEFTDOWN = 0x0002;
        const LEFTUP = 0x0004;
        const RIGHTDOWN = 0x0008;
        const RIGHTUP = 0x0010;
        const MIDDLEDOWN = 0x0020;
        const MIDDLEUP = 0x0040;
        const XDOWN = 0x0080;
        const XUP = 0x0100;
        const WHEEL = 0x0800;
        const HWHEEL = 0x1000;
        const ABSOLUTE = 0x8000;
    }
}

/// One keyboard event. `unicode` events carry a UTF-16 unit in `sc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyRecord {
    pub vk: u8,
    pub sc: u16,
    pub key_up: bool,
    pub extended: bool,
    pub unicode: bool,
    pub extra_info: u32,
}

/// One mouse event; coordinates are screen pixels for absolute moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseRecord {
    pub flags: MouseFlags,
    pub data: i32,
    pub x: i32,
    pub y: i32,
    pub extra_info: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRecord {
    Key(KeyRecord),
    Mouse(MouseRecord),
    /// Milliseconds; only present in batches.
    Delay(u32),
}

impl EventRecord {
    pub fn as_key(&self) -> Option<&KeyRecord> {
        match self {
            EventRecord::Key(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_mouse(&self) -> Option<&MouseRecord> {
        match self {
            EventRecord::Mouse(mouse) => Some(mouse),
            _ => None,
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventRecord::Key(key) if key.unicode => write!(
                f,
                "unicode U+{:04X} {}",
                key.sc,
                if key.key_up { "up" } else { "down" }
            ),
            EventRecord::Key(key) => write!(
                f,
                "key {} sc{:03X} {}{}",
                keys::vk_to_key_name(key.vk),
                key.sc,
                if key.key_up { "up" } else { "down" },
                if key.extra_info == KEY_IGNORE { " (disguise)" } else { "" }
            ),
            EventRecord::Mouse(mouse) => write!(
                f,
                "mouse {:?} data={} at ({}, {})",
                mouse.flags, mouse.data, mouse.x, mouse.y
            ),
            EventRecord::Delay(ms) => write!(f, "delay {}ms", ms),
        }
    }
}

/// Extra-info marker of events the hook must ignore completely.
pub const KEY_IGNORE: u32 = 0xFFC3_D44F;
/// Marker for events that update physical state but are otherwise ignored.
pub const KEY_PHYS_IGNORE: u32 = KEY_IGNORE - 1;
/// Marker for events ignored by everything except modifier tracking.
pub const KEY_IGNORE_ALL_EXCEPT_MODIFIER: u32 = KEY_IGNORE - 2;
pub const SEND_LEVEL_MAX: u32 = 100;
/// Lowest marker value in the ignore range.
pub const KEY_IGNORE_MIN: u32 = key_ignore_level(SEND_LEVEL_MAX);

/// Extra-info tag for events sent at `level`.
#[inline]
pub const fn key_ignore_level(level: u32) -> u32 {
    KEY_IGNORE_ALL_EXCEPT_MODIFIER - level
}

/// Send level encoded in an extra-info tag.
///
/// Tags outside the ignore range come from other sources and rank above
/// every send level; the two top markers decode to negative levels.
#[inline]
pub fn input_level_from_info(info: u32) -> i32 {
    if (KEY_IGNORE_MIN..=KEY_IGNORE).contains(&info) {
        key_ignore_level(0) as i32 - info as i32
    } else {
        SEND_LEVEL_MAX as i32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_level_round_trip() {
        for level in 0..=SEND_LEVEL_MAX {
            assert_eq!(input_level_from_info(key_ignore_level(level)), level as i32);
        }
    }

    #[test]
    fn test_input_level_markers() {
        assert_eq!(input_level_from_info(KEY_IGNORE), -2);
        assert_eq!(input_level_from_info(KEY_PHYS_IGNORE), -1);
        assert_eq!(input_level_from_info(0), 101);
        assert_eq!(input_level_from_info(KEY_IGNORE_MIN - 1), 101);
    }

    #[test]
    fn test_modifier_keys() {
        assert_eq!(ModifierMask::RALT.key(), Some((keys::VK_RMENU, keys::SC_RALT)));
        assert_eq!(ModifierMask::SHIFT.key(), None);
        assert_eq!(ModifierMask::from_vk(keys::VK_SHIFT), ModifierMask::LSHIFT);
        assert_eq!(ModifierMask::from_vk(0x41), ModifierMask::empty());
        assert_eq!(
            (ModifierMask::LCONTROL | ModifierMask::RWIN).classes(),
            ModifierMask::CONTROL | ModifierMask::WIN
        );
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("inputthenplay".parse::<SendMode>().unwrap(), SendMode::InputThenPlay);
        assert!("fast".parse::<SendMode>().is_err());
        assert_eq!("Client".parse::<CoordMode>().unwrap(), CoordMode::Client);
        assert_eq!("wd".parse::<MouseButton>().unwrap(), MouseButton::WheelDown);
    }
}
