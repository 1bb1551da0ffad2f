//! Send engine: turns send strings, clicks and moves into primitive input
//! events while keeping the modifier ledger consistent.

pub mod dispatch;
pub mod ledger;
pub mod mouse;
pub mod parsing;
pub mod reconcile;
pub mod timing;
pub mod types;


use std::time::Duration;

use tracing::debug;

use crate::config::{AppConfig, ThreadSettings};
use crate::error::{Error, Result};
use crate::keys::{self, NamedKey};
use crate::platform::Platform;
use dispatch::EventArray;
use ledger::{ExplicitModifier, ModifierLedger};
use parsing::{ClickSpec, KeyAction, KeyTarget, SendToken};
use types::*;

/// Default for how long a hotkey's modifiers are assumed to still be held
/// when no keyboard hook is available.
pub const DEFAULT_HOTKEY_MODIFIER_TIMEOUT: i32 = 50;

/// Per-call options of [`Sender::send_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub raw: SendRawMode,
    /// `None` uses the thread's send mode.
    pub mode: Option<SendMode>,
    pub target: Option<WindowId>,
}

/// State of one send call; dropped when the call returns.
#[derive(Debug)]
pub(crate) struct SendSession {
    /// Resolved backend; never `InputThenPlay`.
    pub mode: SendMode,
    pub raw: SendRawMode,
    pub blind: bool,
    pub key_delay: i32,
    pub press_duration: i32,
    pub mouse_delay: i32,
    pub level_tag: u32,
    pub layout: LayoutId,
    pub altgr: bool,
    pub target: Option<WindowId>,
    pub own_window: bool,
    /// Best guess of the modifiers the user is holding, fixed at entry.
    pub physical_estimate: ModifierMask,
    /// Entry modifiers kept down in blind mode.
    pub blind_base: ModifierMask,
    /// Modifiers for the next key only.
    pub key_mods: ModifierMask,
    pub batch: Option<EventArray>,
    /// Cursor position as of the last queued move.
    pub cursor: Option<Point>,
}

/// Resolves `InputThenPlay` and falls back when another hook would break the
/// atomicity of an Input batch.
pub fn resolve_send_mode(mode: SendMode, other_hooks_present: bool) -> SendMode {
    match mode {
        SendMode::InputThenPlay if other_hooks_present => SendMode::Play,
        SendMode::InputThenPlay => SendMode::Input,
        SendMode::Input if other_hooks_present => SendMode::Event,
        other => other,
    }
}

/// Input synthesis engine bound to one platform backend.
pub struct Sender<P: Platform> {
    platform: P,
    ledger: ModifierLedger,
    settings: ThreadSettings,
    menu_mask: (u8, u16),
    hotkey_modifier_timeout: i32,
}

impl<P: Platform> Sender<P> {
    pub fn new(platform: P, settings: ThreadSettings) -> Self {
        Self {
            platform,
            ledger: ModifierLedger::new(),
            settings,
            menu_mask: (keys::VK_LCONTROL, keys::SC_LCONTROL),
            hotkey_modifier_timeout: DEFAULT_HOTKEY_MODIFIER_TIMEOUT,
        }
    }

    pub fn from_config(platform: P, config: &AppConfig) -> Result<Self> {
        let mut sender = Self::new(platform, ThreadSettings::try_from(config)?);
        sender.set_menu_mask_key(&config.menu_mask_key)?;
        sender.hotkey_modifier_timeout = config.hotkey_modifier_timeout;
        Ok(sender)
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    #[inline]
    pub fn ledger(&self) -> &ModifierLedger {
        &self.ledger
    }

    #[inline]
    pub fn ledger_mut(&mut self) -> &mut ModifierLedger {
        &mut self.ledger
    }

    #[inline]
    pub fn settings(&self) -> &ThreadSettings {
        &self.settings
    }

    #[inline]
    pub fn settings_mut(&mut self) -> &mut ThreadSettings {
        &mut self.settings
    }

    /// Sets the level that tags every emitted event.
    pub fn set_send_level(&mut self, level: u32) -> Result<()> {
        if level > SEND_LEVEL_MAX {
            return Err(Error::invalid_value("send_level", level));
        }
        self.settings.send_level = level;
        Ok(())
    }

    /// Chooses the key tapped to disguise Win/Alt transitions.
    pub fn set_menu_mask_key(&mut self, name: &str) -> Result<()> {
        match keys::key_name_to_key(name) {
            Some(NamedKey::Key { vk, sc }) if vk != 0 => {
                let sc = if sc == 0 { keys::vk_to_sc(vk) } else { sc };
                self.menu_mask = (vk, sc);
                Ok(())
            }
            _ => Err(Error::invalid_value("menu_mask_key", name)),
        }
    }

    /// Milliseconds; negative means a hotkey's modifiers never time out.
    pub fn set_hotkey_modifier_timeout(&mut self, timeout: i32) {
        self.hotkey_modifier_timeout = timeout;
    }

    /// Records that a hotkey thread just started.
    pub fn note_hotkey_start(&mut self) {
        self.ledger.this_hotkey_start = Some(self.platform.now());
    }

    /// Sends `text` with the thread's send mode.
    pub fn send(&mut self, text: &str) -> Result<()> {
        self.send_with(text, SendOptions::default())
    }

    pub fn send_with(&mut self, text: &str, options: SendOptions) -> Result<()> {
        let tokens = parsing::tokenize(text, options.raw);
        if tokens.is_empty() {
            return Ok(());
        }

        self.sync_logical();
        let mode = options.mode.unwrap_or(self.settings.send_mode);
        let mut session = self.open_session(mode, options.raw, options.target);

        let exclusions = match tokens.first() {
            Some(SendToken::Blind(exclusions)) => {
                session.blind = true;
                *exclusions
            }
            _ => ModifierMask::empty(),
        };

        let has_hook = self.platform.has_keyboard_hook();
        let physical = if has_hook {
            self.platform.physical_modifiers()
        } else {
            ModifierMask::empty()
        };
        self.ledger.refresh_persistent(physical & self.ledger.logical);
        let entry_logical = self.ledger.logical;
        session.physical_estimate = if has_hook {
            physical
        } else if self.hotkey_modifiers_fresh() {
            entry_logical
        } else {
            ModifierMask::empty()
        };
        if session.blind {
            session.blind_base = entry_logical & !exclusions;
        }

        debug!(
            mode = %session.mode,
            blind = session.blind,
            tokens = tokens.len(),
            entry = ?entry_logical,
            "send"
        );

        let caps_lock_stored = !session.blind
            && self.settings.store_caps_lock_mode
            && self.platform.is_key_toggled(keys::VK_CAPITAL);
        if caps_lock_stored {
            self.tap_lock_key(&mut session, keys::VK_CAPITAL);
        }

        let result = self.run_tokens(&mut session, &tokens);
        if result.is_err() && session.batch.is_some() {
            self.discard_batch(&mut session);
            return result;
        }

        let restore = self.ledger.persistent
            | self.ledger.remapped
            | session.physical_estimate
            | session.blind_base;
        self.set_modifier_state(&mut session, restore, true, true);
        if caps_lock_stored {
            self.tap_lock_key(&mut session, keys::VK_CAPITAL);
        }

        self.flush_batch(&mut session);
        result
    }

    pub(crate) fn open_session(
        &mut self,
        mode: SendMode,
        raw: SendRawMode,
        target: Option<WindowId>,
    ) -> SendSession {
        let mode = resolve_send_mode(mode, self.platform.other_hooks_present());
        let settings = &self.settings;
        let (key_delay, press_duration, mouse_delay) = if mode == SendMode::Play {
            (
                settings.key_delay_play,
                settings.press_duration_play,
                settings.mouse_delay_play,
            )
        } else {
            (settings.key_delay, settings.press_duration, settings.mouse_delay)
        };

        let layout = self.platform.focused_layout(target);
        let platform = &self.platform;
        let altgr = self
            .ledger
            .layout_has_altgr(layout, |layout| platform.layout_has_altgr(layout));

        SendSession {
            mode,
            raw,
            blind: false,
            key_delay,
            press_duration,
            mouse_delay,
            level_tag: key_ignore_level(settings.send_level),
            layout,
            altgr,
            target,
            own_window: target.is_some_and(|window| platform.is_own_window(window)),
            physical_estimate: ModifierMask::empty(),
            blind_base: ModifierMask::empty(),
            key_mods: ModifierMask::empty(),
            batch: mode
                .is_batch()
                .then(|| EventArray::new(mode, self.ledger.snapshot())),
            cursor: None,
        }
    }

    /// Reloads the logical modifier state from the OS key state.
    pub(crate) fn sync_logical(&mut self) {
        let mut logical = ModifierMask::empty();
        for (bit, vk, _) in ModifierMask::KEYS {
            if self.platform.is_key_down_async(vk) {
                logical |= bit;
            }
        }
        self.ledger.logical = logical;
        self.ledger.logical_non_ignored &= logical;
    }

    /// Whether a recent hotkey's modifiers may still be physically held.
    fn hotkey_modifiers_fresh(&self) -> bool {
        if self.hotkey_modifier_timeout < 0 {
            return true;
        }
        let Some(start) = self.ledger.this_hotkey_start else {
            return false;
        };
        let elapsed = self.platform.now().saturating_sub(start);
        elapsed < Duration::from_millis(self.hotkey_modifier_timeout as u64)
    }

    fn run_tokens(&mut self, session: &mut SendSession, tokens: &[SendToken]) -> Result<()> {
        for token in tokens {
            match token {
                SendToken::Blind(_) => {}
                SendToken::Raw => session.raw = SendRawMode::Raw,
                SendToken::Text => session.raw = SendRawMode::RawText,
                SendToken::Modifier(bit) => {
                    if !self.ledger.persistent.intersects(bit.classes()) {
                        session.key_mods |= *bit;
                    }
                }
                SendToken::Char(ch) => {
                    self.send_char(session, *ch, KeyEventType::KeyDownAndUp);
                    session.key_mods = ModifierMask::empty();
                }
                SendToken::Key { target, action } => {
                    self.send_key_directive(session, *target, *action)?;
                    session.key_mods = ModifierMask::empty();
                }
                SendToken::Click(spec) => {
                    let desired = self.key_modifiers(session);
                    self.set_modifier_state(session, desired, true, true);
                    self.click(session, spec)?;
                    session.key_mods = ModifierMask::empty();
                }
                SendToken::Asc(digits) => {
                    self.send_asc(session, digits);
                    session.key_mods = ModifierMask::empty();
                }
                SendToken::Unicode(cp) => {
                    self.send_code_point(session, *cp, KeyEventType::KeyDownAndUp);
                    session.key_mods = ModifierMask::empty();
                }
                SendToken::InvalidUnicode(directive) => {
                    return Err(Error::InvalidUnicode(directive.clone()));
                }
                SendToken::Unknown(directive) => {
                    debug!(directive = %directive, "dropping unrecognized directive");
                    session.key_mods = ModifierMask::empty();
                }
            }
        }
        Ok(())
    }

    /// Modifiers that must be down for the next key.
    #[inline]
    fn key_modifiers(&self, session: &SendSession) -> ModifierMask {
        session.key_mods | self.ledger.persistent | session.blind_base
    }

    /// Sends one key `repeat` times with `mods` held for it.
    pub(crate) fn send_key(
        &mut self,
        session: &mut SendSession,
        vk: u8,
        sc: u16,
        mods: ModifierMask,
        event_type: KeyEventType,
        repeat: u32,
    ) {
        for _ in 0..repeat {
            let held = self.ledger.persistent | session.blind_base;
            self.set_modifier_state(session, mods | held, true, true);
            let tag = session.level_tag;
            self.emit_key_event(session, event_type, vk, sc, tag);
            self.do_key_delay(session, None);

            // Ctrl and Shift linger until the next key needs otherwise.
            let mut added = mods & (ModifierMask::WIN | ModifierMask::ALT) & !held;
            if !added.is_empty() && self.ledger.logical.intersects(added) {
                // AltGr's implicit LCtrl goes with it.
                if session.altgr
                    && added.contains(ModifierMask::RALT)
                    && !(mods | held).contains(ModifierMask::LCONTROL)
                {
                    added |= ModifierMask::LCONTROL;
                }
                let desired = self.ledger.logical & !added;
                self.set_modifier_state(session, desired, true, false);
            }
        }
    }

    fn send_key_directive(
        &mut self,
        session: &mut SendSession,
        target: KeyTarget,
        action: KeyAction,
    ) -> Result<()> {
        match target {
            KeyTarget::Char(ch) => {
                for _ in 0..action.repeat() {
                    self.send_char(session, ch, action.event_type());
                }
            }
            KeyTarget::Named(NamedKey::Mouse(button)) => {
                let spec = ClickSpec {
                    button,
                    count: action.repeat(),
                    action: match action {
                        KeyAction::Press(_) => ClickAction::DownAndUp,
                        KeyAction::Up => ClickAction::Up,
                        _ => ClickAction::Down,
                    },
                    ..ClickSpec::default()
                };
                let desired = self.key_modifiers(session);
                self.set_modifier_state(session, desired, true, true);
                self.click(session, &spec)?;
            }
            KeyTarget::Named(NamedKey::Key { vk, sc }) => {
                let vk = if vk == 0 {
                    self.platform.map_sc_to_vk(sc, session.layout)
                } else {
                    vk
                };
                if keys::is_modifier_vk(vk) {
                    self.send_modifier_key(session, vk, sc, action);
                } else {
                    let mods = session.key_mods;
                    self.send_key(session, vk, sc, mods, action.event_type(), action.repeat());
                }
            }
        }
        Ok(())
    }

    /// Explicit transition of a modifier key, e.g. `{LWin up}`.
    fn send_modifier_key(&mut self, session: &mut SendSession, vk: u8, sc: u16, action: KeyAction) {
        let bit = ModifierMask::from_vk(vk);
        for _ in 0..action.repeat() {
            // The key's own bit is left to the explicit event.
            let desired = (self.key_modifiers(session) & !bit) | (self.ledger.logical & bit);
            self.set_modifier_state(session, desired, true, true);

            if action == KeyAction::Up
                && bit.intersects(ModifierMask::WIN | ModifierMask::ALT)
                && !(session.altgr && bit == ModifierMask::RALT)
                && !session.blind
                && !self.ledger.blind_held.intersects(bit)
                && (self.ledger.logical & !bit).is_empty()
            {
                let (mask_vk, mask_sc) = self.menu_mask;
                self.emit_key(session, mask_vk, mask_sc, false, KEY_IGNORE);
                self.emit_key(session, mask_vk, mask_sc, true, KEY_IGNORE);
            }

            let tag = session.level_tag;
            self.emit_key_event(session, action.event_type(), vk, sc, tag);
            self.do_key_delay(session, None);
        }

        let explicit = match action {
            KeyAction::Down => Some(ExplicitModifier::Down),
            KeyAction::DownR => Some(ExplicitModifier::DownRemapped),
            KeyAction::Up => Some(ExplicitModifier::Up),
            KeyAction::DownTemp | KeyAction::Press(_) => None,
        };
        if let Some(explicit) = explicit {
            self.ledger.note_explicit(bit, explicit, session.blind);
            match explicit {
                ExplicitModifier::Up => session.blind_base &= !bit,
                _ if session.blind => session.blind_base |= bit,
                _ => {}
            }
        }
    }

    /// Sends a character through the layout, or as a Unicode packet when the
    /// layout has no key for it. Text mode sends everything but newline and
    /// tab as Unicode packets.
    pub(crate) fn send_char(&mut self, session: &mut SendSession, ch: char, event_type: KeyEventType) {
        let mods = session.key_mods;
        match ch {
            '\n' => self.send_key(session, keys::VK_RETURN, 0, mods, event_type, 1),
            '\t' => self.send_key(session, keys::VK_TAB, 0, mods, event_type, 1),
            _ if session.raw == SendRawMode::RawText => {
                self.send_code_point(session, ch as u32, event_type)
            }
            _ => match self.platform.char_to_vk(ch, session.layout) {
                Some((vk, char_mods)) => {
                    let mut char_mods = char_mods;
                    let ctrl_alt = ModifierMask::LCONTROL | ModifierMask::LALT;
                    if session.altgr && char_mods.contains(ctrl_alt) {
                        char_mods = (char_mods & !ctrl_alt) | ModifierMask::RALT;
                    }
                    self.send_key(session, vk, 0, mods | char_mods, event_type, 1);
                }
                None => self.send_code_point(session, ch as u32, event_type),
            },
        }
    }

    /// Injects a code point as Unicode packets, one per UTF-16 unit.
    pub(crate) fn send_code_point(&mut self, session: &mut SendSession, cp: u32, event_type: KeyEventType) {
        let Some(ch) = char::from_u32(cp) else {
            return;
        };
        let desired = self.key_modifiers(session);
        self.set_modifier_state(session, desired, true, true);

        let mut units = [0u16; 2];
        for &unit in ch.encode_utf16(&mut units).iter() {
            if event_type != KeyEventType::KeyUp {
                self.emit_unicode(session, unit, false);
            }
            if event_type != KeyEventType::KeyDown {
                self.emit_unicode(session, unit, true);
            }
        }
        self.do_key_delay(session, None);
    }

    /// Alt+numpad entry of a character code.
    fn send_asc(&mut self, session: &mut SendSession, digits: &str) {
        let num_lock_forced = !self.platform.is_key_toggled(keys::VK_NUMLOCK);
        if num_lock_forced {
            self.tap_lock_key(session, keys::VK_NUMLOCK);
        }

        let desired = self.key_modifiers(session) | ModifierMask::LALT;
        self.set_modifier_state(session, desired, false, true);
        let tag = session.level_tag;
        for digit in digits.bytes() {
            let vk = keys::VK_NUMPAD0 + (digit - b'0');
            self.emit_key_event(session, KeyEventType::KeyDownAndUp, vk, 0, tag);
            self.do_key_delay(session, None);
        }
        // The release types the character, so no menu can open.
        let held = self.key_modifiers(session);
        let desired = self.ledger.logical & !(ModifierMask::LALT - held);
        self.set_modifier_state(session, desired, false, false);

        if num_lock_forced {
            self.tap_lock_key(session, keys::VK_NUMLOCK);
        }
    }

    fn tap_lock_key(&mut self, session: &mut SendSession, vk: u8) {
        let tag = session.level_tag;
        self.emit_key_event(session, KeyEventType::KeyDownAndUp, vk, 0, tag);
        self.do_key_delay(session, None);
    }
}
