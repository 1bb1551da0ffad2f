//! Virtual-key codes, scan codes and key-name lookup.
//!
//! Scan codes are stored as `u16`; a non-zero high byte marks an extended
//! key (e.g. `0x11D` is Right-Control), which is how the extended flag of an
//! emitted event is derived.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::sender::types::MouseButton;

pub const VK_LBUTTON: u8 = 0x01;
pub const VK_RBUTTON: u8 = 0x02;
pub const VK_MBUTTON: u8 = 0x04;
pub const VK_XBUTTON1: u8 = 0x05;
pub const VK_XBUTTON2: u8 = 0x06;
pub const VK_BACK: u8 = 0x08;
pub const VK_TAB: u8 = 0x09;
pub const VK_RETURN: u8 = 0x0D;
pub const VK_SHIFT: u8 = 0x10;
pub const VK_CONTROL: u8 = 0x11;
pub const VK_MENU: u8 = 0x12;
pub const VK_PAUSE: u8 = 0x13;
pub const VK_CAPITAL: u8 = 0x14;
pub const VK_ESCAPE: u8 = 0x1B;
pub const VK_SPACE: u8 = 0x20;
pub const VK_LWIN: u8 = 0x5B;
pub const VK_RWIN: u8 = 0x5C;
pub const VK_APPS: u8 = 0x5D;
pub const VK_NUMPAD0: u8 = 0x60;
pub const VK_NUMLOCK: u8 = 0x90;
pub const VK_SCROLL: u8 = 0x91;
pub const VK_LSHIFT: u8 = 0xA0;
pub const VK_RSHIFT: u8 = 0xA1;
pub const VK_LCONTROL: u8 = 0xA2;
pub const VK_RCONTROL: u8 = 0xA3;
pub const VK_LMENU: u8 = 0xA4;
pub const VK_RMENU: u8 = 0xA5;
pub const VK_PACKET: u8 = 0xE7;

pub const SC_LSHIFT: u16 = 0x2A;
pub const SC_RSHIFT: u16 = 0x36;
pub const SC_LCONTROL: u16 = 0x1D;
pub const SC_RCONTROL: u16 = 0x11D;
pub const SC_LALT: u16 = 0x38;
pub const SC_RALT: u16 = 0x138;
pub const SC_LWIN: u16 = 0x15B;
pub const SC_RWIN: u16 = 0x15C;

/// A key named inside a `{...}` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    /// Keyboard key; either code may be zero and is derived later.
    Key { vk: u8, sc: u16 },
    /// Mouse button or wheel direction.
    Mouse(MouseButton),
}

#[inline(always)]
pub fn is_extended_sc(sc: u16) -> bool {
    sc & 0xFF00 != 0
}

/// Returns true for the left/right/neutral Shift, Control and Alt keys and both Win keys.
#[inline]
pub fn is_modifier_vk(vk: u8) -> bool {
    matches!(
        vk,
        VK_SHIFT
            | VK_CONTROL
            | VK_MENU
            | VK_LSHIFT
            | VK_RSHIFT
            | VK_LCONTROL
            | VK_RCONTROL
            | VK_LMENU
            | VK_RMENU
            | VK_LWIN
            | VK_RWIN
    )
}

/// Default (US layout) scan code for a virtual key, or 0 when unknown.
pub fn vk_to_sc(vk: u8) -> u16 {
    SCANCODE_MAP.get(&vk).copied().unwrap_or(0)
}

/// Default (US layout) virtual key for a scan code, or 0 when unknown.
pub fn sc_to_vk(sc: u16) -> u8 {
    VK_FROM_SCANCODE.get(&sc).copied().unwrap_or(0)
}

/// Converts virtual key code to key name string.
pub fn vk_to_key_name(vk: u8) -> String {
    match vk {
        0x41..=0x5A | 0x30..=0x39 => char::from(vk).to_string(),
        0x60..=0x69 => format!("Numpad{}", vk - 0x60),
        0x70..=0x87 => format!("F{}", vk - 0x70 + 1),
        VK_SPACE => "Space".to_string(),
        VK_RETURN => "Enter".to_string(),
        VK_TAB => "Tab".to_string(),
        VK_ESCAPE => "Escape".to_string(),
        VK_BACK => "Backspace".to_string(),
        VK_CAPITAL => "CapsLock".to_string(),
        VK_NUMLOCK => "NumLock".to_string(),
        VK_LSHIFT => "LShift".to_string(),
        VK_RSHIFT => "RShift".to_string(),
        VK_LCONTROL => "LControl".to_string(),
        VK_RCONTROL => "RControl".to_string(),
        VK_LMENU => "LAlt".to_string(),
        VK_RMENU => "RAlt".to_string(),
        VK_LWIN => "LWin".to_string(),
        VK_RWIN => "RWin".to_string(),
        VK_SHIFT => "Shift".to_string(),
        VK_CONTROL => "Control".to_string(),
        VK_MENU => "Alt".to_string(),
        VK_PACKET => "Packet".to_string(),
        _ => format!("vk{:02X}", vk),
    }
}

/// Resolves a directive key name (case-insensitive).
///
/// Single characters are not handled here; the caller sends them as text.
pub fn key_name_to_key(key_name: &str) -> Option<NamedKey> {
    let key = key_name.to_ascii_uppercase();

    if let Some(button) = mouse_button_name(&key) {
        return Some(NamedKey::Mouse(button));
    }

    // F1-F24
    if let Some(num) = key.strip_prefix('F')
        && let Ok(num) = num.parse::<u8>()
        && (1..=24).contains(&num)
    {
        let vk = 0x70 + num - 1;
        return Some(NamedKey::Key { vk, sc: vk_to_sc(vk) });
    }

    // Numpad0-Numpad9
    if let Some(num) = key.strip_prefix("NUMPAD")
        && let Ok(num) = num.parse::<u8>()
        && num <= 9
    {
        let vk = VK_NUMPAD0 + num;
        return Some(NamedKey::Key { vk, sc: vk_to_sc(vk) });
    }

    // vkNN, scNNN, vkNNscNNN
    if key.starts_with("VK") || key.starts_with("SC") {
        return parse_vk_sc(&key);
    }

    let vk = match key.as_str() {
        "ENTER" | "RETURN" => VK_RETURN,
        "ESC" | "ESCAPE" => VK_ESCAPE,
        "SPACE" => VK_SPACE,
        "TAB" => VK_TAB,
        "BACKSPACE" | "BS" | "BACK" => VK_BACK,
        "DELETE" | "DEL" => 0x2E,
        "INSERT" | "INS" => 0x2D,
        "HOME" => 0x24,
        "END" => 0x23,
        "PGUP" | "PAGEUP" => 0x21,
        "PGDN" | "PAGEDOWN" => 0x22,
        "UP" => 0x26,
        "DOWN" => 0x28,
        "LEFT" => 0x25,
        "RIGHT" => 0x27,
        "CAPSLOCK" => VK_CAPITAL,
        "SCROLLLOCK" => VK_SCROLL,
        "NUMLOCK" => VK_NUMLOCK,
        "PAUSE" => VK_PAUSE,
        "PRINTSCREEN" => 0x2C,
        "APPSKEY" => VK_APPS,
        "SLEEP" => 0x5F,
        "CONTROL" | "CTRL" => VK_CONTROL,
        "LCONTROL" | "LCTRL" => VK_LCONTROL,
        "RCONTROL" | "RCTRL" => VK_RCONTROL,
        "SHIFT" => VK_SHIFT,
        "LSHIFT" => VK_LSHIFT,
        "RSHIFT" => VK_RSHIFT,
        "ALT" => VK_MENU,
        "LALT" => VK_LMENU,
        "RALT" => VK_RMENU,
        "LWIN" => VK_LWIN,
        "RWIN" => VK_RWIN,
        "NUMPADDOT" | "NUMPADDEL" => 0x6E,
        "NUMPADMULT" => 0x6A,
        "NUMPADADD" => 0x6B,
        "NUMPADSUB" => 0x6D,
        "NUMPADDIV" => 0x6F,
        "NUMPADENTER" => return Some(NamedKey::Key { vk: VK_RETURN, sc: 0x11C }),
        "BROWSER_BACK" => 0xA6,
        "BROWSER_FORWARD" => 0xA7,
        "BROWSER_REFRESH" => 0xA8,
        "BROWSER_HOME" => 0xAC,
        "VOLUME_MUTE" => 0xAD,
        "VOLUME_DOWN" => 0xAE,
        "VOLUME_UP" => 0xAF,
        "MEDIA_NEXT" => 0xB0,
        "MEDIA_PREV" => 0xB1,
        "MEDIA_STOP" => 0xB2,
        "MEDIA_PLAY_PAUSE" => 0xB3,
        _ => return None,
    };
    Some(NamedKey::Key { vk, sc: vk_to_sc(vk) })
}

fn parse_vk_sc(key: &str) -> Option<NamedKey> {
    let (vk_part, sc_part) = match key.find("SC") {
        Some(0) => (None, Some(&key[2..])),
        Some(idx) => (Some(&key[2..idx]), Some(&key[idx + 2..])),
        None => (Some(&key[2..]), None),
    };
    let vk = match vk_part {
        Some(hex) => u8::from_str_radix(hex, 16).ok()?,
        None => 0,
    };
    let sc = match sc_part {
        Some(hex) => u16::from_str_radix(hex, 16).ok()?,
        None => 0,
    };
    if vk == 0 && sc == 0 {
        return None;
    }
    Some(NamedKey::Key { vk, sc })
}

pub fn mouse_button_name(name_upper: &str) -> Option<MouseButton> {
    match name_upper {
        "LBUTTON" | "LEFT" | "L" => Some(MouseButton::Left),
        "RBUTTON" | "RIGHT" | "R" => Some(MouseButton::Right),
        "MBUTTON" | "MIDDLE" | "M" => Some(MouseButton::Middle),
        "XBUTTON1" | "X1" => Some(MouseButton::X1),
        "XBUTTON2" | "X2" => Some(MouseButton::X2),
        "WHEELUP" | "WU" => Some(MouseButton::WheelUp),
        "WHEELDOWN" | "WD" => Some(MouseButton::WheelDown),
        "WHEELLEFT" | "WL" => Some(MouseButton::WheelLeft),
        "WHEELRIGHT" | "WR" => Some(MouseButton::WheelRight),
        _ => None,
    }
}

/// US-layout character lookup: virtual key plus whether Shift is needed.
pub fn us_char_to_vk(ch: char) -> Option<(u8, bool)> {
    let mapped = match ch {
        'a'..='z' => (ch.to_ascii_uppercase() as u8, false),
        'A'..='Z' => (ch as u8, true),
        '0'..='9' => (ch as u8, false),
        ' ' => (VK_SPACE, false),
        '\t' => (VK_TAB, false),
        '\n' | '\r' => (VK_RETURN, false),
        ')' => (b'0', true),
        '!' => (b'1', true),
        '@' => (b'2', true),
        '#' => (b'3', true),
        '$' => (b'4', true),
        '%' => (b'5', true),
        '^' => (b'6', true),
        '&' => (b'7', true),
        '*' => (b'8', true),
        '(' => (b'9', true),
        ';' => (0xBA, false),
        ':' => (0xBA, true),
        '=' => (0xBB, false),
        '+' => (0xBB, true),
        ',' => (0xBC, false),
        '<' => (0xBC, true),
        '-' => (0xBD, false),
        '_' => (0xBD, true),
        '.' => (0xBE, false),
        '>' => (0xBE, true),
        '/' => (0xBF, false),
        '?' => (0xBF, true),
        '`' => (0xC0, false),
        '~' => (0xC0, true),
        '[' => (0xDB, false),
        '{' => (0xDB, true),
        '\\' => (0xDC, false),
        '|' => (0xDC, true),
        ']' => (0xDD, false),
        '}' => (0xDD, true),
        '\'' => (0xDE, false),
        '"' => (0xDE, true),
        _ => return None,
    };
    Some(mapped)
}

pub static SCANCODE_MAP: LazyLock<HashMap<u8, u16>> = LazyLock::new(|| {
    [
        // letter keys (A-Z)
        (0x41, 0x1E),
        (0x42, 0x30),
        (0x43, 0x2E),
        (0x44, 0x20),
        (0x45, 0x12),
        (0x46, 0x21),
        (0x47, 0x22),
        (0x48, 0x23),
        (0x49, 0x17),
        (0x4A, 0x24),
        (0x4B, 0x25),
        (0x4C, 0x26),
        (0x4D, 0x32),
        (0x4E, 0x31),
        (0x4F, 0x18),
        (0x50, 0x19),
        (0x51, 0x10),
        (0x52, 0x13),
        (0x53, 0x1F),
        (0x54, 0x14),
        (0x55, 0x16),
        (0x56, 0x2F),
        (0x57, 0x11),
        (0x58, 0x2D),
        (0x59, 0x15),
        (0x5A, 0x2C),
        // number keys (0-9)
        (0x30, 0x0B),
        (0x31, 0x02),
        (0x32, 0x03),
        (0x33, 0x04),
        (0x34, 0x05),
        (0x35, 0x06),
        (0x36, 0x07),
        (0x37, 0x08),
        (0x38, 0x09),
        (0x39, 0x0A),
        // function keys (F1-F12)
        (0x70, 0x3B),
        (0x71, 0x3C),
        (0x72, 0x3D),
        (0x73, 0x3E),
        (0x74, 0x3F),
        (0x75, 0x40),
        (0x76, 0x41),
        (0x77, 0x42),
        (0x78, 0x43),
        (0x79, 0x44),
        (0x7A, 0x57),
        (0x7B, 0x58),
        // special keys
        (0x1B, 0x01),  // ESC
        (0x0D, 0x1C),  // ENTER
        (0x09, 0x0F),  // TAB
        (0x20, 0x39),  // SPACE
        (0x08, 0x0E),  // BACKSPACE
        (0x2E, 0x153), // DELETE
        (0x2D, 0x152), // INSERT
        (0x24, 0x147), // HOME
        (0x23, 0x14F), // END
        (0x21, 0x149), // PAGEUP
        (0x22, 0x151), // PAGEDOWN
        (0x26, 0x148), // UP
        (0x28, 0x150), // DOWN
        (0x25, 0x14B), // LEFT
        (0x27, 0x14D), // RIGHT
        (0x5D, 0x15D), // APPS
        // lock keys
        (0x14, 0x3A),  // CAPSLOCK
        (0x90, 0x145), // NUMLOCK
        (0x91, 0x46),  // SCROLL LOCK
        (0x13, 0x45),  // PAUSE
        (0x2C, 0x137), // PRINT SCREEN
        // numpad keys
        (0x60, 0x52), // NUMPAD0
        (0x61, 0x4F), // NUMPAD1
        (0x62, 0x50), // NUMPAD2
        (0x63, 0x51), // NUMPAD3
        (0x64, 0x4B), // NUMPAD4
        (0x65, 0x4C), // NUMPAD5
        (0x66, 0x4D), // NUMPAD6
        (0x67, 0x47), // NUMPAD7
        (0x68, 0x48), // NUMPAD8
        (0x69, 0x49), // NUMPAD9
        (0x6A, 0x37),  // MULTIPLY
        (0x6B, 0x4E),  // ADD
        (0x6D, 0x4A),  // SUBTRACT
        (0x6E, 0x53),  // DECIMAL
        (0x6F, 0x135), // DIVIDE
        // OEM keys
        (0xBA, 0x27), // OEM_1 (;:)
        (0xBB, 0x0D), // OEM_PLUS (=+)
        (0xBC, 0x33), // OEM_COMMA (,<)
        (0xBD, 0x0C), // OEM_MINUS (-_)
        (0xBE, 0x34), // OEM_PERIOD (.>)
        (0xBF, 0x35), // OEM_2 (/?)
        (0xC0, 0x29), // OEM_3 (`~)
        (0xDB, 0x1A), // OEM_4 ([{)
        (0xDC, 0x2B), // OEM_5 (\|)
        (0xDD, 0x1B), // OEM_6 (]})
        (0xDE, 0x28), // OEM_7 ('")
        (0xE2, 0x56), // OEM_102 (<>)
        // modifier keys
        (VK_LSHIFT, SC_LSHIFT),
        (VK_RSHIFT, SC_RSHIFT),
        (VK_LCONTROL, SC_LCONTROL),
        (VK_RCONTROL, SC_RCONTROL),
        (VK_LMENU, SC_LALT),
        (VK_RMENU, SC_RALT),
        (VK_LWIN, SC_LWIN),
        (VK_RWIN, SC_RWIN),
        // generic modifier keys
        (VK_SHIFT, SC_LSHIFT),
        (VK_CONTROL, SC_LCONTROL),
        (VK_MENU, SC_LALT),
    ]
    .iter()
    .cloned()
    .collect()
});

/// Reverse of [`SCANCODE_MAP`]; side-specific vks win over the neutral ones.
static VK_FROM_SCANCODE: LazyLock<HashMap<u16, u8>> = LazyLock::new(|| {
    let mut map: HashMap<u16, u8> = HashMap::with_capacity(SCANCODE_MAP.len());
    for (&vk, &sc) in SCANCODE_MAP.iter() {
        if matches!(vk, VK_SHIFT | VK_CONTROL | VK_MENU) {
            continue;
        }
        map.insert(sc, vk);
    }
    map
});
