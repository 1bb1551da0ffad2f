//! Hotstring replacement: erase the typed abbreviation, then type the
//! replacement with its case adjusted to how the abbreviation was typed.

use tracing::debug;

use crate::error::Result;
use crate::platform::Platform;
use crate::sender::types::SendRawMode;
use crate::sender::{SendOptions, Sender};

/// How the replacement's case follows the typed abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotstringCase {
    /// Replacement is sent exactly as defined.
    Preserve,
    /// All caps or a leading capital carry over to the replacement.
    #[default]
    Conform,
    /// Letter-by-letter case transfer through [`apply_case`].
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotstringOptions {
    /// Erase the abbreviation with backspaces first.
    pub backspace: bool,
    pub case: HotstringCase,
    /// `NotRaw` sends the replacement as a send string.
    pub raw: SendRawMode,
    /// Ending character to type after the replacement.
    pub end_char: Option<char>,
}

impl Default for HotstringOptions {
    fn default() -> Self {
        Self {
            backspace: true,
            case: HotstringCase::Conform,
            raw: SendRawMode::RawText,
            end_char: None,
        }
    }
}

/// Copies the case of `typed` onto `text`.
///
/// Both strings are walked together: when the current characters match
/// ignoring case, the typed index advances and the output character takes
/// the case of the typed character now under it (lowercase once `typed` is
/// exhausted). Otherwise the character of `text` is copied unchanged and
/// only `text` advances.
pub fn apply_case(typed: &str, text: &str) -> String {
    let typed: Vec<char> = typed.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut t = 0;

    for ch in text.chars() {
        let matches = typed
            .get(t)
            .is_some_and(|&tc| tc.to_lowercase().eq(ch.to_lowercase()));
        if !matches {
            out.push(ch);
            continue;
        }
        t += 1;
        if typed.get(t).is_some_and(|tc| tc.is_uppercase()) {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Case-conforms `replacement` to the typed abbreviation.
pub fn conform_case(typed: &str, replacement: &str) -> String {
    let letters: Vec<char> = typed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    if !letters.first().is_some_and(|c| c.is_uppercase()) {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl<P: Platform> Sender<P> {
    /// Replaces the abbreviation `typed` with `replacement`.
    pub fn send_hotstring(
        &mut self,
        typed: &str,
        replacement: &str,
        options: &HotstringOptions,
    ) -> Result<()> {
        let count = typed.chars().count();
        debug!(count, case = ?options.case, "hotstring replacement");

        if options.backspace && count > 0 {
            self.send(&format!("{{BS {}}}", count))?;
        }

        let text = match options.case {
            HotstringCase::Preserve => replacement.to_string(),
            HotstringCase::Conform => conform_case(typed, replacement),
            HotstringCase::Mirror => apply_case(typed, replacement),
        };
        self.send_with(
            &text,
            SendOptions {
                raw: options.raw,
                ..SendOptions::default()
            },
        )?;

        if let Some(end) = options.end_char {
            self.send_with(
                end.encode_utf8(&mut [0u8; 4]),
                SendOptions {
                    raw: SendRawMode::RawText,
                    ..SendOptions::default()
                },
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_case_advances_on_match() {
        assert_eq!(apply_case("wysiwyg", "WYSIWYG"), "wysiwyg");
        assert_eq!(apply_case("TEH", "teh"), "TEh");
    }

    #[test]
    fn test_apply_case_copies_mismatches() {
        assert_eq!(apply_case("AB", "xAB"), "xAb");
        assert_eq!(apply_case("", "Keep"), "Keep");
    }

    #[test]
    fn test_conform_case() {
        assert_eq!(conform_case("btw", "by the way"), "by the way");
        assert_eq!(conform_case("Btw", "by the way"), "By the way");
        assert_eq!(conform_case("BTW", "by the way"), "BY THE WAY");
        assert_eq!(conform_case("B", "by the way"), "By the way");
        assert_eq!(conform_case("Btw", ""), "");
    }
}
