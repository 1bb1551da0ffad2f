//! Modifier state machine: the ordered event sequence that moves the logical
//! modifier state from one mask to another.
//!
//! Releasing Win or Alt with nothing pressed in between opens the Start menu
//! or focuses the menu bar. Where that could happen the plan wraps the
//! transition in a down/up of the menu-mask key ("disguise").

use smallvec::SmallVec;

use super::types::*;
use super::{SendSession, Sender};
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierStep {
    Press(ModifierMask),
    Release(ModifierMask),
    MaskDown,
    MaskUp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierPlan {
    pub steps: SmallVec<[ModifierStep; 16]>,
    /// Logical state once every step has been applied.
    pub result: ModifierMask,
}

impl ModifierPlan {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

struct Planner {
    steps: SmallVec<[ModifierStep; 16]>,
    now: ModifierMask,
    altgr: bool,
}

impl Planner {
    fn press(&mut self, bit: ModifierMask) {
        self.steps.push(ModifierStep::Press(bit));
        self.now |= bit;
        if self.altgr && bit == ModifierMask::RALT {
            self.now |= ModifierMask::LCONTROL;
        }
    }

    fn release(&mut self, bit: ModifierMask) {
        self.steps.push(ModifierStep::Release(bit));
        self.now &= !bit;
        if self.altgr && bit == ModifierMask::RALT {
            self.now &= !ModifierMask::LCONTROL;
        }
    }

    fn mask_tap(&mut self) {
        self.steps.push(ModifierStep::MaskDown);
        self.steps.push(ModifierStep::MaskUp);
    }

    fn press_disguised(&mut self, bit: ModifierMask, disguise: bool) {
        if disguise {
            self.steps.push(ModifierStep::MaskDown);
        }
        self.press(bit);
        if disguise {
            self.steps.push(ModifierStep::MaskUp);
        }
    }

    fn toggle(&mut self, bit: ModifierMask, new: ModifierMask) {
        if self.now.contains(bit) && !new.contains(bit) {
            self.release(bit);
        } else if !self.now.contains(bit) && new.contains(bit) {
            self.press(bit);
        }
    }
}

/// Computes the events that take `known` to `desired`.
///
/// Total over all masks; `desired == known` yields an empty plan. On AltGr
/// layouts a desired RAlt implies LCtrl, since the OS asserts both.
pub fn plan_modifier_change(
    desired: ModifierMask,
    known: ModifierMask,
    altgr: bool,
    disguise_down: bool,
    disguise_up: bool,
) -> ModifierPlan {
    let mut new = desired;
    if altgr && new.contains(ModifierMask::RALT) {
        new |= ModifierMask::LCONTROL;
    }
    let now = known;
    if new == now {
        return ModifierPlan {
            steps: SmallVec::new(),
            result: now,
        };
    }

    let shift_or_alt = ModifierMask::SHIFT | ModifierMask::ALT;
    let ctrl_not_down = !now.intersects(ModifierMask::CONTROL);
    let ctrl_will_not_be_down = !new.intersects(ModifierMask::CONTROL)
        && !(altgr && new.contains(ModifierMask::RALT));
    let ctrl_nor_shift_nor_alt_down = ctrl_not_down && !now.intersects(shift_or_alt);
    let ctrl_or_shift_or_alt_will_be_down =
        !ctrl_will_not_be_down || new.intersects(shift_or_alt);

    let defer_win_release = ctrl_nor_shift_nor_alt_down && ctrl_or_shift_or_alt_will_be_down;
    let defer_alt_release = ctrl_not_down && !ctrl_will_not_be_down;
    let release_shift_before_alt_ctrl = defer_alt_release
        || (!now.intersects(ModifierMask::ALT) && new.intersects(ModifierMask::ALT));

    let releasing = |bit: ModifierMask| now.contains(bit) && !new.contains(bit);
    let pressing = |bit: ModifierMask| !now.contains(bit) && new.contains(bit);

    let mut plan = Planner {
        steps: SmallVec::new(),
        now,
        altgr,
    };

    for win in [ModifierMask::LWIN, ModifierMask::RWIN] {
        if releasing(win) {
            if !defer_win_release {
                if disguise_up && ctrl_nor_shift_nor_alt_down {
                    plan.mask_tap();
                }
                plan.release(win);
            }
        } else if pressing(win) {
            plan.press_disguised(win, disguise_down);
        }
    }

    if release_shift_before_alt_ctrl {
        for shift in [ModifierMask::LSHIFT, ModifierMask::RSHIFT] {
            if releasing(shift) {
                plan.release(shift);
            }
        }
    }

    if releasing(ModifierMask::LALT) {
        if !defer_alt_release {
            if ctrl_not_down && disguise_up {
                plan.mask_tap();
            }
            plan.release(ModifierMask::LALT);
        }
    } else if pressing(ModifierMask::LALT) {
        plan.press_disguised(ModifierMask::LALT, disguise_down && ctrl_will_not_be_down);
    }

    if releasing(ModifierMask::RALT) {
        if altgr {
            plan.release(ModifierMask::RALT);
        } else if !defer_alt_release {
            if ctrl_not_down && disguise_up {
                plan.mask_tap();
            }
            plan.release(ModifierMask::RALT);
        }
    } else if pressing(ModifierMask::RALT) {
        if altgr {
            for ctrl in [ModifierMask::LCONTROL, ModifierMask::RCONTROL] {
                if plan.now.contains(ctrl) {
                    plan.release(ctrl);
                }
            }
            plan.press(ModifierMask::RALT);
        } else {
            plan.press_disguised(ModifierMask::RALT, disguise_down && ctrl_will_not_be_down);
        }
    }

    plan.toggle(ModifierMask::LCONTROL, new);
    plan.toggle(ModifierMask::RCONTROL, new);

    for shift in [ModifierMask::LSHIFT, ModifierMask::RSHIFT] {
        if plan.now.contains(shift) && !new.contains(shift) {
            plan.release(shift);
        } else if pressing(shift) {
            plan.press(shift);
        }
    }

    if defer_win_release {
        for win in [ModifierMask::LWIN, ModifierMask::RWIN] {
            if releasing(win) {
                plan.release(win);
            }
        }
    }
    if defer_alt_release {
        if releasing(ModifierMask::LALT) {
            plan.release(ModifierMask::LALT);
        }
        if releasing(ModifierMask::RALT) && !altgr {
            plan.release(ModifierMask::RALT);
        }
    }

    ModifierPlan {
        steps: plan.steps,
        result: plan.now,
    }
}

impl<P: Platform> Sender<P> {
    /// Moves the logical modifier state to `desired`, emitting through the
    /// session's backend.
    pub(crate) fn set_modifier_state(
        &mut self,
        session: &mut SendSession,
        desired: ModifierMask,
        disguise_down: bool,
        disguise_up: bool,
    ) {
        let plan = plan_modifier_change(
            desired,
            self.ledger.logical,
            session.altgr,
            disguise_down,
            disguise_up,
        );
        if plan.is_empty() {
            return;
        }
        tracing::trace!(
            from = ?self.ledger.logical,
            to = ?plan.result,
            steps = plan.steps.len(),
            "reconciling modifiers"
        );

        let (mask_vk, mask_sc) = self.menu_mask;
        let mask_bit = ModifierMask::from_vk(mask_vk);
        let mut mask_skipped = false;
        for step in plan.steps.iter().copied() {
            match step {
                ModifierStep::Press(bit) | ModifierStep::Release(bit) => {
                    if let Some((vk, sc)) = bit.key() {
                        let key_up = matches!(step, ModifierStep::Release(_));
                        let tag = session.level_tag;
                        self.emit_key(session, vk, sc, key_up, tag);
                    }
                }
                ModifierStep::MaskDown => {
                    // A mask key that is already held would be released by
                    // the matching up half.
                    mask_skipped = self.ledger.logical.intersects(mask_bit);
                    if !mask_skipped {
                        self.emit_key(session, mask_vk, mask_sc, false, KEY_IGNORE);
                    }
                }
                ModifierStep::MaskUp => {
                    if !mask_skipped {
                        self.emit_key(session, mask_vk, mask_sc, true, KEY_IGNORE);
                    }
                    mask_skipped = false;
                }
            }
        }

        if session.mode != SendMode::Input {
            let press_duration = session.press_duration;
            self.do_key_delay(session, Some(press_duration));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ModifierStep::*;
    use super::*;

    const NONE: ModifierMask = ModifierMask::empty();

    fn plan(desired: ModifierMask, known: ModifierMask) -> ModifierPlan {
        plan_modifier_change(desired, known, false, true, true)
    }

    #[test]
    fn test_same_state_is_noop() {
        for bits in [0u8, 0x01, 0x09, 0x55, 0xFF] {
            let mask = ModifierMask::from_bits_retain(bits);
            for altgr in [false, true] {
                assert!(plan_modifier_change(mask, mask, altgr, true, true).is_empty());
            }
        }
    }

    #[test]
    fn test_plan_reaches_desired_and_is_idempotent() {
        for desired in 0..=255u8 {
            for known in [0u8, 0x01, 0x04, 0x10, 0x40, 0x45, 0xFF] {
                let desired = ModifierMask::from_bits_retain(desired);
                let known = ModifierMask::from_bits_retain(known);
                let first = plan(desired, known);
                assert_eq!(first.result, desired, "{:?} -> {:?}", known, desired);
                assert!(plan(desired, first.result).is_empty());
            }
        }
    }

    #[test]
    fn test_press_control() {
        let p = plan(ModifierMask::LCONTROL, NONE);
        assert_eq!(p.steps.as_slice(), &[Press(ModifierMask::LCONTROL)]);
    }

    #[test]
    fn test_bare_win_release_is_disguised() {
        let p = plan(NONE, ModifierMask::LWIN);
        assert_eq!(
            p.steps.as_slice(),
            &[MaskDown, MaskUp, Release(ModifierMask::LWIN)]
        );
        let quiet = plan_modifier_change(NONE, ModifierMask::LWIN, false, true, false);
        assert_eq!(quiet.steps.as_slice(), &[Release(ModifierMask::LWIN)]);
    }

    #[test]
    fn test_win_release_with_shift_down_not_disguised() {
        let p = plan(ModifierMask::LSHIFT, ModifierMask::LWIN | ModifierMask::LSHIFT);
        assert_eq!(p.steps.as_slice(), &[Release(ModifierMask::LWIN)]);
    }

    #[test]
    fn test_win_release_deferred_until_ctrl_down() {
        let p = plan(ModifierMask::LCONTROL, ModifierMask::LWIN);
        assert_eq!(
            p.steps.as_slice(),
            &[Press(ModifierMask::LCONTROL), Release(ModifierMask::LWIN)]
        );
    }

    #[test]
    fn test_alt_release_deferred_until_ctrl_down() {
        let p = plan(ModifierMask::LCONTROL, ModifierMask::LALT);
        assert_eq!(
            p.steps.as_slice(),
            &[Press(ModifierMask::LCONTROL), Release(ModifierMask::LALT)]
        );
    }

    #[test]
    fn test_bare_alt_release_is_disguised() {
        let p = plan(NONE, ModifierMask::LALT);
        assert_eq!(
            p.steps.as_slice(),
            &[MaskDown, MaskUp, Release(ModifierMask::LALT)]
        );
    }

    #[test]
    fn test_alt_press_wrapped_unless_ctrl_follows() {
        let p = plan(ModifierMask::LALT, NONE);
        assert_eq!(
            p.steps.as_slice(),
            &[MaskDown, Press(ModifierMask::LALT), MaskUp]
        );
        let p = plan(ModifierMask::LALT | ModifierMask::LCONTROL, NONE);
        assert_eq!(
            p.steps.as_slice(),
            &[Press(ModifierMask::LALT), Press(ModifierMask::LCONTROL)]
        );
    }

    #[test]
    fn test_shift_released_before_alt_press() {
        let p = plan(ModifierMask::LALT, ModifierMask::LSHIFT);
        assert_eq!(
            p.steps.as_slice(),
            &[
                Release(ModifierMask::LSHIFT),
                MaskDown,
                Press(ModifierMask::LALT),
                MaskUp
            ]
        );
    }

    #[test]
    fn test_altgr_press_releases_control_first() {
        let p = plan_modifier_change(ModifierMask::RALT, ModifierMask::RCONTROL, true, true, true);
        assert_eq!(
            p.steps.as_slice(),
            &[Release(ModifierMask::RCONTROL), Press(ModifierMask::RALT)]
        );
        assert_eq!(p.result, ModifierMask::RALT | ModifierMask::LCONTROL);
    }

    #[test]
    fn test_altgr_release_never_disguised() {
        let known = ModifierMask::RALT | ModifierMask::LCONTROL;
        let p = plan_modifier_change(NONE, known, true, true, true);
        assert_eq!(p.steps.as_slice(), &[Release(ModifierMask::RALT)]);
        assert!(p.result.is_empty());
    }
}
