//! Hotkey admission working together with the send engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use keysend::config::{AppConfig, ThreadSettings};
use keysend::sender::types::key_ignore_level;
use keysend::{
    Admission, Criterion, Error, HookOracle, ModifierMask, RecordingPlatform, Sender, Trigger,
    TriggerRegistry, Variant,
};

fn sender() -> Sender<RecordingPlatform> {
    Sender::new(RecordingPlatform::new(), ThreadSettings::default())
}

/// Tests that a launched hotkey lets its send restore held modifiers.
#[test]
fn test_launch_feeds_modifier_restoration() {
    let registry = TriggerRegistry::default();
    let id = registry.add(Trigger::hotkey("^j").with_variant(Variant::new()));

    let mut sender = sender();
    sender.platform_mut().physical = ModifierMask::LCONTROL;

    let now = sender.platform().now();
    let admission = registry
        .process_hotkey(id, 0, None, sender.ledger_mut(), now)
        .unwrap();
    assert_eq!(admission, Admission::Launched { id, variant: 0 });

    sender.send("x").unwrap();
    let last = *sender.platform().key_events().last().unwrap();
    assert_eq!(last.vk, keysend::keys::VK_LCONTROL);
    assert!(!last.key_up);
}

/// Tests that the engine's own output cannot re-trigger a hotkey at its level.
#[test]
fn test_sent_input_respects_input_levels() {
    let registry = TriggerRegistry::default();
    let id = registry.add(Trigger::hotstring("btw").with_variant(Variant::new().with_input_level(2)));

    let mut sender = sender();
    sender.set_send_level(2).unwrap();
    sender.send("b").unwrap();
    let info = sender.platform().key_events()[0].extra_info;
    assert_eq!(info, key_ignore_level(2));

    let mut ledger = sender.ledger().clone();
    assert_eq!(
        registry
            .process_hotkey(id, info, None, &mut ledger, Duration::ZERO)
            .unwrap(),
        Admission::Ignored
    );
    assert!(matches!(
        registry
            .process_hotkey(id, key_ignore_level(3), None, &mut ledger, Duration::ZERO)
            .unwrap(),
        Admission::Launched { .. }
    ));
}

/// Tests that criteria are re-checked when the trigger fires.
#[test]
fn test_criterion_rechecked_on_fire() {
    let active = Arc::new(AtomicBool::new(true));
    let flag = active.clone();
    let registry = TriggerRegistry::new(10, 5);
    let id = registry.add(
        Trigger::hotkey("F9")
            .with_variant(Variant::new().with_criterion(Criterion::when(move || flag.load(Ordering::Relaxed)))),
    );

    let mut ledger = keysend::sender::ledger::ModifierLedger::new();
    assert!(matches!(
        registry
            .process_hotkey(id, 0, Some(0), &mut ledger, Duration::ZERO)
            .unwrap(),
        Admission::Launched { .. }
    ));

    active.store(false, Ordering::Relaxed);
    assert_eq!(
        registry
            .process_hotkey(id, 0, Some(0), &mut ledger, Duration::ZERO)
            .unwrap(),
        Admission::Ignored
    );
}

/// Tests that the registry honors the configured thread limits.
#[test]
fn test_registry_from_config() {
    let config = AppConfig {
        max_threads: 2,
        max_threads_per_hotkey: 2,
        ..AppConfig::default()
    };
    let registry = TriggerRegistry::from_config(&config);
    let id = registry.add(Trigger::hotkey("F10").with_variant(Variant::new()));

    let mut ledger = keysend::sender::ledger::ModifierLedger::new();
    let mut fire = || {
        registry
            .process_hotkey(id, 0, None, &mut ledger, Duration::ZERO)
            .unwrap()
    };
    assert!(matches!(fire(), Admission::Launched { .. }));
    assert!(matches!(fire(), Admission::Launched { .. }));
    assert_eq!(fire(), Admission::Queued);
}

/// Tests that removed triggers are no longer admitted.
#[test]
fn test_removed_trigger_is_unknown() {
    let registry = TriggerRegistry::default();
    let id = registry.add(Trigger::hotkey("F11").with_variant(Variant::new()));
    registry.remove(id).unwrap();

    let mut ledger = keysend::sender::ledger::ModifierLedger::new();
    assert!(matches!(
        registry.process_hotkey(id, 0, None, &mut ledger, Duration::ZERO),
        Err(Error::UnknownTrigger(_))
    ));
}
