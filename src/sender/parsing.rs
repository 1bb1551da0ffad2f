//! Tokenizer for the send mini-language.
//!
//! Text is split into a closed set of tokens before anything is sent. Raw
//! and Text switches change how the remainder is tokenized, so the tokenizer
//! tracks the raw mode itself.

use super::types::*;
use crate::keys::{self, NamedKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    Named(NamedKey),
    /// Single character written inside braces, e.g. `{a down}` or `{{}`.
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Down and up, repeated.
    Press(u32),
    Down,
    /// Down without becoming persistent.
    DownTemp,
    /// Down, and pressed again at the end of every later send.
    DownR,
    Up,
}

impl KeyAction {
    pub fn event_type(self) -> KeyEventType {
        match self {
            KeyAction::Press(_) => KeyEventType::KeyDownAndUp,
            KeyAction::Down | KeyAction::DownTemp | KeyAction::DownR => KeyEventType::KeyDown,
            KeyAction::Up => KeyEventType::KeyUp,
        }
    }

    pub fn repeat(self) -> u32 {
        match self {
            KeyAction::Press(count) => count,
            _ => 1,
        }
    }
}

/// Options of a `{Click}` directive or a mouse button key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickSpec {
    pub button: MouseButton,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub count: u32,
    pub action: ClickAction,
    pub relative: bool,
    /// `None` uses the default mouse speed.
    pub speed: Option<i32>,
}

impl Default for ClickSpec {
    fn default() -> Self {
        Self {
            button: MouseButton::Left,
            x: None,
            y: None,
            count: 1,
            action: ClickAction::DownAndUp,
            relative: false,
            speed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendToken {
    /// `^ + ! #` prefix for the next key.
    Modifier(ModifierMask),
    Char(char),
    Key { target: KeyTarget, action: KeyAction },
    Click(ClickSpec),
    Raw,
    Text,
    /// Blind mode with the modifiers excluded from it.
    Blind(ModifierMask),
    /// Alt+numpad code, digits as written.
    Asc(String),
    Unicode(u32),
    InvalidUnicode(String),
    /// Unrecognized directive; dropped when interpreted.
    Unknown(String),
}

/// Splits `text` into tokens, starting in `raw` mode.
pub fn tokenize(text: &str, raw: SendRawMode) -> Vec<SendToken> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut mode = raw;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\r' {
            if chars.get(i + 1) == Some(&'\n') {
                i += 1;
            }
            tokens.push(SendToken::Char('\n'));
            i += 1;
            continue;
        }
        if mode == SendRawMode::RawText {
            tokens.push(SendToken::Char(c));
            i += 1;
            continue;
        }

        match c {
            '{' => {
                // The first character inside may itself be a brace: `{}}`.
                let search_from = i + 2;
                let close = chars
                    .get(search_from..)
                    .and_then(|rest| rest.iter().position(|&ch| ch == '}'));
                match close {
                    Some(offset) => {
                        let end = search_from + offset;
                        let inner: String = chars[i + 1..end].iter().collect();
                        let token = parse_directive(&inner, tokens.is_empty());
                        match token {
                            SendToken::Raw => mode = SendRawMode::Raw,
                            SendToken::Text => mode = SendRawMode::RawText,
                            _ => {}
                        }
                        tokens.push(token);
                        i = end + 1;
                    }
                    None => {
                        tokens.push(SendToken::Char('{'));
                        i += 1;
                    }
                }
            }
            '^' | '+' | '!' | '#' if mode == SendRawMode::NotRaw => {
                if let Some(bit) = ModifierMask::from_symbol(c) {
                    tokens.push(SendToken::Modifier(bit));
                }
                i += 1;
            }
            _ => {
                tokens.push(SendToken::Char(c));
                i += 1;
            }
        }
    }

    tokens
}

fn parse_directive(inner: &str, first: bool) -> SendToken {
    let unknown = || SendToken::Unknown(inner.to_string());

    // The name runs to the first blank after its first character, so `{  2}`
    // names the space key.
    let split = inner
        .char_indices()
        .skip(1)
        .find(|(_, ch)| *ch == ' ' || *ch == '\t')
        .map(|(idx, _)| idx);
    let (name, rest) = match split {
        Some(idx) => (&inner[..idx], inner[idx..].trim()),
        None => (inner, ""),
    };
    if name.is_empty() {
        return unknown();
    }
    let upper = name.to_ascii_uppercase();

    if first && upper.starts_with("BLIND") {
        return SendToken::Blind(parse_blind_exclusions(&name[5..]));
    }
    if rest.is_empty() {
        match upper.as_str() {
            "RAW" => return SendToken::Raw,
            "TEXT" => return SendToken::Text,
            _ => {}
        }
    }
    if upper == "CLICK" {
        return parse_click(rest).map_or_else(unknown, SendToken::Click);
    }
    if upper == "ASC" {
        return if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            SendToken::Asc(rest.to_string())
        } else {
            unknown()
        };
    }
    if let Some(hex) = upper.strip_prefix("U+") {
        return match parse_code_point(hex) {
            Some(cp) if rest.is_empty() => SendToken::Unicode(cp),
            _ => SendToken::InvalidUnicode(inner.to_string()),
        };
    }

    let Some(action) = parse_action(rest) else {
        return unknown();
    };
    let mut name_chars = name.chars();
    if let (Some(ch), None) = (name_chars.next(), name_chars.next()) {
        return SendToken::Key {
            target: KeyTarget::Char(ch),
            action,
        };
    }
    match keys::key_name_to_key(name) {
        Some(key) => SendToken::Key {
            target: KeyTarget::Named(key),
            action,
        },
        None => unknown(),
    }
}

fn parse_action(rest: &str) -> Option<KeyAction> {
    if rest.is_empty() {
        return Some(KeyAction::Press(1));
    }
    match rest.to_ascii_lowercase().as_str() {
        "down" => return Some(KeyAction::Down),
        "downtemp" => return Some(KeyAction::DownTemp),
        "downr" => return Some(KeyAction::DownR),
        "up" => return Some(KeyAction::Up),
        _ => {}
    }
    let digits: String = rest.chars().take_while(|ch| ch.is_ascii_digit()).collect();
    digits.parse().ok().map(KeyAction::Press)
}

/// `^!+#`, each optionally prefixed by `<` or `>` to name one side.
fn parse_blind_exclusions(spec: &str) -> ModifierMask {
    let mut mask = ModifierMask::empty();
    let mut side: Option<char> = None;
    for ch in spec.chars() {
        match ch {
            '<' | '>' => side = Some(ch),
            _ => {
                if let Some(left) = ModifierMask::from_symbol(ch) {
                    mask |= match side {
                        Some('<') => left,
                        // Right bits sit one above the left ones.
                        Some(_) => ModifierMask::from_bits_retain(left.bits() << 1),
                        None => left.classes(),
                    };
                }
                side = None;
            }
        }
    }
    mask
}

fn parse_code_point(hex: &str) -> Option<u32> {
    if hex.is_empty() || hex.len() > 6 {
        return None;
    }
    let cp = u32::from_str_radix(hex, 16).ok()?;
    char::from_u32(cp).map(|_| cp)
}

fn parse_click(rest: &str) -> Option<ClickSpec> {
    let mut spec = ClickSpec::default();
    let mut numbers: Vec<i32> = Vec::with_capacity(3);
    for part in rest
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
    {
        if let Ok(n) = part.parse::<i32>() {
            numbers.push(n);
            continue;
        }
        match part.to_ascii_uppercase().as_str() {
            "DOWN" | "D" => spec.action = ClickAction::Down,
            "UP" | "U" => spec.action = ClickAction::Up,
            "REL" | "RELATIVE" => spec.relative = true,
            other => spec.button = keys::mouse_button_name(other)?,
        }
    }
    match numbers.as_slice() {
        [] => {}
        [count] => spec.count = (*count).max(0) as u32,
        [x, y] => {
            spec.x = Some(*x);
            spec.y = Some(*y);
        }
        [x, y, count, ..] => {
            spec.x = Some(*x);
            spec.y = Some(*y);
            spec.count = (*count).max(0) as u32;
        }
    }
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<SendToken> {
        tokenize(text, SendRawMode::NotRaw)
    }

    #[test]
    fn test_modifier_prefixes() {
        assert_eq!(
            toks("^+c"),
            vec![
                SendToken::Modifier(ModifierMask::LCONTROL),
                SendToken::Modifier(ModifierMask::LSHIFT),
                SendToken::Char('c'),
            ]
        );
    }

    #[test]
    fn test_key_directives() {
        assert_eq!(
            toks("{Enter 3}{LWin down}{a up}"),
            vec![
                SendToken::Key {
                    target: KeyTarget::Named(NamedKey::Key {
                        vk: keys::VK_RETURN,
                        sc: 0x1C
                    }),
                    action: KeyAction::Press(3),
                },
                SendToken::Key {
                    target: KeyTarget::Named(NamedKey::Key {
                        vk: keys::VK_LWIN,
                        sc: keys::SC_LWIN
                    }),
                    action: KeyAction::Down,
                },
                SendToken::Key {
                    target: KeyTarget::Char('a'),
                    action: KeyAction::Up,
                },
            ]
        );
    }

    #[test]
    fn test_brace_literals() {
        assert_eq!(
            toks("{{}{}}"),
            vec![
                SendToken::Key {
                    target: KeyTarget::Char('{'),
                    action: KeyAction::Press(1)
                },
                SendToken::Key {
                    target: KeyTarget::Char('}'),
                    action: KeyAction::Press(1)
                },
            ]
        );
        assert_eq!(toks("{"), vec![SendToken::Char('{')]);
    }

    #[test]
    fn test_unknown_directive() {
        assert_eq!(toks("{Bogus}"), vec![SendToken::Unknown("Bogus".into())]);
        assert_eq!(toks("{Enter sideways}"), vec![SendToken::Unknown("Enter sideways".into())]);
    }

    #[test]
    fn test_blind_only_first() {
        assert_eq!(
            toks("{Blind}x"),
            vec![SendToken::Blind(ModifierMask::empty()), SendToken::Char('x')]
        );
        assert_eq!(
            toks("x{Blind}"),
            vec![SendToken::Char('x'), SendToken::Unknown("Blind".into())]
        );
    }

    #[test]
    fn test_blind_exclusions() {
        assert_eq!(
            toks("{Blind^<+>!}")[0],
            SendToken::Blind(ModifierMask::CONTROL | ModifierMask::LSHIFT | ModifierMask::RALT)
        );
    }

    #[test]
    fn test_raw_is_irreversible() {
        assert_eq!(
            toks("^{Raw}^{Enter}"),
            vec![
                SendToken::Modifier(ModifierMask::LCONTROL),
                SendToken::Raw,
                SendToken::Char('^'),
                SendToken::Key {
                    target: KeyTarget::Named(NamedKey::Key {
                        vk: keys::VK_RETURN,
                        sc: 0x1C
                    }),
                    action: KeyAction::Press(1),
                },
            ]
        );
    }

    #[test]
    fn test_text_mode_is_fully_literal() {
        assert_eq!(
            toks("{Text}{a}\r\n"),
            vec![
                SendToken::Text,
                SendToken::Char('{'),
                SendToken::Char('a'),
                SendToken::Char('}'),
                SendToken::Char('\n'),
            ]
        );
    }

    #[test]
    fn test_unicode_directive() {
        assert_eq!(toks("{U+1F600}"), vec![SendToken::Unicode(0x1F600)]);
        assert_eq!(toks("{u+e9}"), vec![SendToken::Unicode(0xE9)]);
        assert_eq!(toks("{U+XYZ}"), vec![SendToken::InvalidUnicode("U+XYZ".into())]);
        assert_eq!(toks("{U+110000}"), vec![SendToken::InvalidUnicode("U+110000".into())]);
        assert_eq!(toks("{U+}"), vec![SendToken::InvalidUnicode("U+".into())]);
    }

    #[test]
    fn test_asc_directive() {
        assert_eq!(toks("{ASC 0169}"), vec![SendToken::Asc("0169".into())]);
        assert_eq!(toks("{ASC x}"), vec![SendToken::Unknown("ASC x".into())]);
    }

    #[test]
    fn test_click_directive() {
        let SendToken::Click(spec) = &toks("{Click 100, 200 Right 2}")[0] else {
            panic!("expected click");
        };
        assert_eq!(spec.x, Some(100));
        assert_eq!(spec.y, Some(200));
        assert_eq!(spec.button, MouseButton::Right);
        assert_eq!(spec.count, 2);

        let SendToken::Click(spec) = &toks("{Click WU 3}")[0] else {
            panic!("expected click");
        };
        assert_eq!(spec.button, MouseButton::WheelUp);
        assert_eq!(spec.count, 3);
        assert_eq!(spec.x, None);

        let SendToken::Click(spec) = &toks("{Click 5 5 Down Rel}")[0] else {
            panic!("expected click");
        };
        assert_eq!(spec.action, ClickAction::Down);
        assert!(spec.relative);

        assert_eq!(toks("{Click Sideways}"), vec![SendToken::Unknown("Click Sideways".into())]);
    }
}
