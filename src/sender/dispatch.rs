//! Event emission through the Event, Input and Play backends.
//!
//! Event mode injects each record as it is produced. Input and Play collect
//! records in an [`EventArray`] that is flushed once at the end of the call,
//! or discarded whole if it could not be built.

use std::time::Duration;

use tracing::{debug, trace, warn};

use super::ledger::LedgerSnapshot;
use super::types::*;
use super::{SendSession, Sender};
use crate::keys;
use crate::platform::Platform;

/// Ordered batch of records for one Input or Play flush.
#[derive(Debug)]
pub struct EventArray {
    mode: SendMode,
    events: Vec<EventRecord>,
    snapshot: LedgerSnapshot,
    discarded: bool,
}

impl EventArray {
    pub const INPUT_CAPACITY: usize = 65536;
    pub const PLAY_CAPACITY: usize = 32768;

    pub fn new(mode: SendMode, snapshot: LedgerSnapshot) -> Self {
        Self {
            mode,
            events: Vec::new(),
            snapshot,
            discarded: false,
        }
    }

    #[inline]
    pub fn ceiling(&self) -> usize {
        match self.mode {
            SendMode::Play => Self::PLAY_CAPACITY,
            _ => Self::INPUT_CAPACITY,
        }
    }

    /// Appends a record. Once the ceiling is hit or memory runs out the whole
    /// batch is dropped and later pushes are ignored.
    pub fn push(&mut self, record: EventRecord) {
        if self.discarded {
            return;
        }
        if self.events.len() >= self.ceiling() || self.events.try_reserve(1).is_err() {
            warn!(
                mode = %self.mode,
                len = self.events.len(),
                "event batch exhausted; nothing will be sent"
            );
            self.discard();
            return;
        }
        self.events.push(record);
    }

    pub fn discard(&mut self) {
        self.discarded = true;
        self.events = Vec::new();
    }

    #[inline]
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    #[inline]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot
    }
}

/// Play mode replays neutral modifier keys; the scan code keeps the side.
#[inline]
pub fn neutral_vk(vk: u8) -> u8 {
    match vk {
        keys::VK_LSHIFT | keys::VK_RSHIFT => keys::VK_SHIFT,
        keys::VK_LCONTROL | keys::VK_RCONTROL => keys::VK_CONTROL,
        keys::VK_LMENU | keys::VK_RMENU => keys::VK_MENU,
        other => other,
    }
}

impl<P: Platform> Sender<P> {
    /// Emits one key transition and records it in the ledger.
    pub(crate) fn emit_key(
        &mut self,
        session: &mut SendSession,
        vk: u8,
        sc: u16,
        key_up: bool,
        extra_info: u32,
    ) {
        let vk = if vk == 0 {
            self.platform.map_sc_to_vk(sc, session.layout)
        } else {
            vk
        };
        let sc = if sc == 0 {
            self.platform.map_vk_to_sc(vk, session.layout)
        } else {
            sc
        };

        let record = KeyRecord {
            vk: if session.mode == SendMode::Play { neutral_vk(vk) } else { vk },
            sc,
            key_up,
            extended: keys::is_extended_sc(sc),
            unicode: false,
            extra_info,
        };
        self.ledger.note_key(vk, key_up, extra_info, session.altgr);
        self.dispatch(session, EventRecord::Key(record));

        if session.own_window && session.batch.is_none() && keys::is_modifier_vk(vk) {
            // Let our own window see the modifier before the next key.
            self.platform.wait(Duration::ZERO);
        }
    }

    /// Emits down, up, or down + press duration + up.
    pub(crate) fn emit_key_event(
        &mut self,
        session: &mut SendSession,
        event_type: KeyEventType,
        vk: u8,
        sc: u16,
        extra_info: u32,
    ) {
        match event_type {
            KeyEventType::KeyDown => self.emit_key(session, vk, sc, false, extra_info),
            KeyEventType::KeyUp => self.emit_key(session, vk, sc, true, extra_info),
            KeyEventType::KeyDownAndUp => {
                self.emit_key(session, vk, sc, false, extra_info);
                let press_duration = session.press_duration;
                self.do_key_delay(session, Some(press_duration));
                self.emit_key(session, vk, sc, true, extra_info);
            }
        }
    }

    pub(crate) fn emit_unicode(&mut self, session: &mut SendSession, unit: u16, key_up: bool) {
        let record = KeyRecord {
            vk: keys::VK_PACKET,
            sc: unit,
            key_up,
            extended: false,
            unicode: true,
            extra_info: session.level_tag,
        };
        self.dispatch(session, EventRecord::Key(record));
    }

    pub(crate) fn emit_mouse(
        &mut self,
        session: &mut SendSession,
        flags: MouseFlags,
        data: i32,
        at: Point,
    ) {
        if flags.contains(MouseFlags::MOVE | MouseFlags::ABSOLUTE) {
            session.cursor = Some(at);
        }
        let record = MouseRecord {
            flags,
            data,
            x: at.x,
            y: at.y,
            extra_info: session.level_tag,
        };
        self.dispatch(session, EventRecord::Mouse(record));
    }

    /// Adds a delay marker to the current batch.
    pub(crate) fn emit_delay(&mut self, session: &mut SendSession, ms: u32) {
        if let Some(batch) = session.batch.as_mut() {
            batch.push(EventRecord::Delay(ms));
        }
    }

    fn dispatch(&mut self, session: &mut SendSession, record: EventRecord) {
        trace!(%record, "emit");
        match session.batch.as_mut() {
            Some(batch) => batch.push(record),
            None => {
                if let Err(err) = self.platform.send_input(std::slice::from_ref(&record)) {
                    warn!(error = %err, %record, "failed to inject event");
                }
            }
        }
    }

    /// Sends the session's batch, if any, in one platform call.
    pub(crate) fn flush_batch(&mut self, session: &mut SendSession) {
        let Some(batch) = session.batch.take() else {
            return;
        };
        if batch.is_discarded() {
            self.ledger.restore(batch.snapshot());
            return;
        }
        if batch.is_empty() {
            return;
        }

        debug!(mode = %batch.mode, events = batch.len(), "flushing batch");
        match batch.mode {
            SendMode::Play => {
                if let Err(err) = self.platform.play(batch.events()) {
                    warn!(error = %err, "playback failed; restoring modifier state");
                    self.ledger.restore(batch.snapshot());
                }
            }
            _ => match self.platform.send_input(batch.events()) {
                Ok(sent) if sent < batch.len() => {
                    warn!(sent, total = batch.len(), "batch partially injected");
                    self.sync_logical();
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "batch injection failed; restoring modifier state");
                    self.ledger.restore(batch.snapshot());
                }
            },
        }
    }

    /// Drops the session's batch without sending any of it.
    pub(crate) fn discard_batch(&mut self, session: &mut SendSession) {
        if let Some(batch) = session.batch.take() {
            debug!(events = batch.len(), "discarding batch");
            self.ledger.restore(batch.snapshot());
        }
    }
}
