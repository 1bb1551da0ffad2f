//! Process-wide modifier bookkeeping.

use std::time::Duration;

use smallvec::SmallVec;

use super::types::*;
use crate::keys;

/// Small unordered list of layouts and whether they carry AltGr.
///
/// Entries are never evicted; once full, lookups for unknown layouts are
/// answered by probing without caching.
#[derive(Debug, Default, Clone)]
pub struct LayoutCache {
    entries: SmallVec<[(LayoutId, bool); LayoutCache::CAPACITY]>,
}

impl LayoutCache {
    pub const CAPACITY: usize = 10;

    pub fn has_altgr(&mut self, layout: LayoutId, probe: impl FnOnce(LayoutId) -> bool) -> bool {
        if let Some(&(_, altgr)) = self.entries.iter().find(|(id, _)| *id == layout) {
            return altgr;
        }
        let altgr = probe(layout);
        if self.entries.len() < Self::CAPACITY {
            self.entries.push((layout, altgr));
        }
        altgr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Authoritative modifier model owned by the engine.
#[derive(Debug, Default, Clone)]
pub struct ModifierLedger {
    /// Modifiers the OS currently considers down.
    pub logical: ModifierMask,
    /// Logical modifiers excluding events hotkeys are told to ignore.
    pub logical_non_ignored: ModifierMask,
    /// Put down by `{X down}` and kept across keys and sends.
    pub persistent: ModifierMask,
    /// Put down by `{X downR}`; restored at the end of each send.
    pub remapped: ModifierMask,
    /// Put down by `{X down}` inside a blind send.
    pub blind_held: ModifierMask,
    /// Platform clock reading of the most recent hotkey launch.
    pub this_hotkey_start: Option<Duration>,
    layouts: LayoutCache,
}

impl ModifierLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one emitted key event.
    ///
    /// On AltGr layouts the OS pairs RAlt with an implicit LCtrl transition,
    /// which is mirrored here without a matching event.
    pub fn note_key(&mut self, vk: u8, key_up: bool, extra_info: u32, altgr: bool) {
        let mut bits = ModifierMask::from_vk(vk);
        if bits.is_empty() {
            return;
        }
        if altgr && vk == keys::VK_RMENU {
            bits |= ModifierMask::LCONTROL;
        }
        self.logical.set(bits, !key_up);
        if extra_info != KEY_IGNORE && input_level_from_info(extra_info) > 0 {
            self.logical_non_ignored.set(bits, !key_up);
        }
    }

    /// Drops persistent bits that are no longer logically down or that the
    /// user is now physically holding.
    pub fn refresh_persistent(&mut self, physical_and_logical: ModifierMask) {
        self.persistent &= self.logical & !physical_and_logical;
    }

    /// Applies an explicit `{X down}`, `{X downR}` or `{X up}` for a modifier.
    pub fn note_explicit(&mut self, bit: ModifierMask, event: ExplicitModifier, blind: bool) {
        match event {
            ExplicitModifier::Down => {
                self.persistent |= bit;
                if blind {
                    self.blind_held |= bit;
                }
            }
            ExplicitModifier::DownRemapped => self.remapped |= bit,
            ExplicitModifier::Up => {
                self.persistent &= !bit;
                self.remapped &= !bit;
                self.blind_held &= !bit;
            }
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            logical: self.logical,
            logical_non_ignored: self.logical_non_ignored,
            persistent: self.persistent,
            remapped: self.remapped,
            blind_held: self.blind_held,
        }
    }

    /// Puts the masks back as they were when `snapshot` was taken.
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.logical = snapshot.logical;
        self.logical_non_ignored = snapshot.logical_non_ignored;
        self.persistent = snapshot.persistent;
        self.remapped = snapshot.remapped;
        self.blind_held = snapshot.blind_held;
    }

    pub fn layout_has_altgr(&mut self, layout: LayoutId, probe: impl FnOnce(LayoutId) -> bool) -> bool {
        self.layouts.has_altgr(layout, probe)
    }

    pub fn layout_cache(&self) -> &LayoutCache {
        &self.layouts
    }
}

/// Copy of the ledger masks, taken before a batch is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerSnapshot {
    pub logical: ModifierMask,
    pub logical_non_ignored: ModifierMask,
    pub persistent: ModifierMask,
    pub remapped: ModifierMask,
    pub blind_held: ModifierMask,
}

/// Explicit modifier directive kinds that change ledger membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitModifier {
    Down,
    DownRemapped,
    Up,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_cache_degrades_when_full() {
        let mut cache = LayoutCache::default();
        for id in 0..LayoutCache::CAPACITY {
            assert!(!cache.has_altgr(LayoutId(id), |_| false));
        }
        assert_eq!(cache.len(), LayoutCache::CAPACITY);

        // Not cached, so the probe runs every time.
        let mut probes = 0;
        for _ in 0..3 {
            assert!(cache.has_altgr(LayoutId(99), |_| {
                probes += 1;
                true
            }));
        }
        assert_eq!(probes, 3);
        assert_eq!(cache.len(), LayoutCache::CAPACITY);

        // Cached entries are not probed again.
        assert!(!cache.has_altgr(LayoutId(0), |_| panic!("cached layout probed")));
    }

    #[test]
    fn test_note_key_tracks_logical() {
        let mut ledger = ModifierLedger::new();
        ledger.note_key(keys::VK_LSHIFT, false, key_ignore_level(0), false);
        assert_eq!(ledger.logical, ModifierMask::LSHIFT);
        assert!(ledger.logical_non_ignored.is_empty());

        ledger.note_key(keys::VK_RCONTROL, false, key_ignore_level(3), false);
        assert_eq!(ledger.logical_non_ignored, ModifierMask::RCONTROL);

        ledger.note_key(keys::VK_LSHIFT, true, key_ignore_level(0), false);
        ledger.note_key(0x41, false, key_ignore_level(0), false);
        assert_eq!(ledger.logical, ModifierMask::RCONTROL);
    }

    #[test]
    fn test_disguise_events_never_count_as_real_input() {
        let mut ledger = ModifierLedger::new();
        ledger.note_key(keys::VK_LCONTROL, false, KEY_IGNORE, false);
        assert_eq!(ledger.logical, ModifierMask::LCONTROL);
        assert!(ledger.logical_non_ignored.is_empty());
    }

    #[test]
    fn test_altgr_mirrors_left_control() {
        let mut ledger = ModifierLedger::new();
        ledger.note_key(keys::VK_RMENU, false, key_ignore_level(0), true);
        assert_eq!(ledger.logical, ModifierMask::RALT | ModifierMask::LCONTROL);
        ledger.note_key(keys::VK_RMENU, true, key_ignore_level(0), true);
        assert!(ledger.logical.is_empty());
    }

    #[test]
    fn test_refresh_persistent() {
        let mut ledger = ModifierLedger::new();
        ledger.persistent = ModifierMask::LWIN | ModifierMask::LSHIFT | ModifierMask::RALT;
        ledger.logical = ModifierMask::LWIN | ModifierMask::LSHIFT;
        ledger.refresh_persistent(ModifierMask::LSHIFT);
        assert_eq!(ledger.persistent, ModifierMask::LWIN);
    }

    #[test]
    fn test_explicit_modifiers() {
        let mut ledger = ModifierLedger::new();
        ledger.note_explicit(ModifierMask::LWIN, ExplicitModifier::Down, true);
        ledger.note_explicit(ModifierMask::LSHIFT, ExplicitModifier::DownRemapped, false);
        assert_eq!(ledger.persistent, ModifierMask::LWIN);
        assert_eq!(ledger.blind_held, ModifierMask::LWIN);
        assert_eq!(ledger.remapped, ModifierMask::LSHIFT);

        ledger.note_explicit(ModifierMask::LWIN, ExplicitModifier::Up, false);
        assert!(ledger.persistent.is_empty());
        assert!(ledger.blind_held.is_empty());
    }
}
