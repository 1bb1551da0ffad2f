//! Send engine tests driven through the public API.

use keysend::config::ThreadSettings;
use keysend::keys::{SC_LSHIFT, VK_BACK, VK_LSHIFT};
use keysend::{
    EventRecord, HotstringCase, HotstringOptions, InputSink, KeyRecord, ModifierMask,
    RecordingPlatform, SendMode, SendOptions, SendRawMode, Sender,
};

fn sender() -> Sender<RecordingPlatform> {
    Sender::new(RecordingPlatform::new(), ThreadSettings::default())
}

fn keys_sent(sender: &Sender<RecordingPlatform>) -> Vec<(u8, bool)> {
    sender
        .platform()
        .key_events()
        .iter()
        .map(|key| (key.vk, key.key_up))
        .collect()
}

/// Tests that raw mode types modifier symbols instead of applying them.
#[test]
fn test_raw_mode_sends_symbols() {
    let mut sender = sender();
    sender
        .send_with(
            "+",
            SendOptions {
                raw: SendRawMode::Raw,
                ..SendOptions::default()
            },
        )
        .unwrap();
    assert_eq!(
        keys_sent(&sender),
        vec![
            (VK_LSHIFT, false),
            (0xBB, false),
            (0xBB, true),
            (VK_LSHIFT, true),
        ]
    );
}

/// Tests that `{Raw}` switches the rest of the string to raw mode.
#[test]
fn test_raw_directive_mid_string() {
    let mut sender = sender();
    sender.send("a{Raw}^").unwrap();
    let vks: Vec<u8> = keys_sent(&sender).into_iter().map(|(vk, _)| vk).collect();
    assert_eq!(vks, vec![0x41, 0x41, VK_LSHIFT, b'6', b'6', VK_LSHIFT]);
}

/// Tests that the per-call mode overrides the thread's mode.
#[test]
fn test_per_call_mode() {
    let mut sender = sender();
    sender
        .send_with(
            "ab",
            SendOptions {
                mode: Some(SendMode::Input),
                ..SendOptions::default()
            },
        )
        .unwrap();
    assert_eq!(sender.platform().flushes().len(), 1);
    assert_eq!(sender.settings().send_mode, SendMode::Event);
}

/// Tests that the ledger is reconciled with the OS before each send.
#[test]
fn test_ledger_follows_os_state() {
    let mut sender = sender();
    sender.send("{LShift down}").unwrap();
    assert_eq!(sender.ledger().logical, ModifierMask::LSHIFT);

    // Something else released the key behind the engine's back.
    let release = EventRecord::Key(KeyRecord {
        vk: VK_LSHIFT,
        sc: SC_LSHIFT,
        key_up: true,
        extended: false,
        unicode: false,
        extra_info: 0,
    });
    sender.platform_mut().send_input(&[release]).unwrap();
    sender.platform_mut().clear();

    sender.send("a").unwrap();
    assert!(sender.ledger().persistent.is_empty());
    assert_eq!(keys_sent(&sender), vec![(0x41, false), (0x41, true)]);
}

/// Text typed as Unicode packets, in order.
fn text_sent(sender: &Sender<RecordingPlatform>) -> String {
    sender
        .platform()
        .key_events()
        .iter()
        .filter(|key| key.unicode && !key.key_up)
        .filter_map(|key| char::from_u32(key.sc as u32))
        .collect()
}

/// Tests hotstring replacement with case conformance.
#[test]
fn test_hotstring_conforms_case() {
    let mut sender = sender();
    sender
        .send_hotstring("Btw", "by the way", &HotstringOptions::default())
        .unwrap();
    let keys = sender.platform().key_events();
    assert!(keys[..6].iter().all(|key| key.vk == VK_BACK && !key.unicode));
    assert!(keys[6..].iter().all(|key| key.unicode));
    assert_eq!(text_sent(&sender), "By the way");
}

/// Tests hotstring replacement that mirrors the typed case.
#[test]
fn test_hotstring_mirrors_case() {
    let mut sender = sender();
    let options = HotstringOptions {
        case: HotstringCase::Mirror,
        ..HotstringOptions::default()
    };
    sender.send_hotstring("TEH", "teh", &options).unwrap();
    assert_eq!(text_sent(&sender), "TEh");
    assert!(keys_sent(&sender).iter().all(|&(vk, _)| vk != VK_LSHIFT));
}

/// Tests hotstring replacement typed through the layout in raw mode.
#[test]
fn test_hotstring_raw_uses_layout() {
    let mut sender = sender();
    let options = HotstringOptions {
        case: HotstringCase::Mirror,
        raw: SendRawMode::Raw,
        ..HotstringOptions::default()
    };
    sender.send_hotstring("TEH", "teh", &options).unwrap();
    assert_eq!(
        keys_sent(&sender)[6..].to_vec(),
        vec![
            (VK_LSHIFT, false),
            (b'T', false),
            (b'T', true),
            (b'E', false),
            (b'E', true),
            (VK_LSHIFT, true),
            (b'H', false),
            (b'H', true),
        ]
    );
}

/// Tests the ending character and disabled backspacing.
#[test]
fn test_hotstring_end_char_without_backspace() {
    let mut sender = sender();
    let options = HotstringOptions {
        backspace: false,
        case: HotstringCase::Preserve,
        end_char: Some(' '),
        ..HotstringOptions::default()
    };
    sender.send_hotstring("omw", "OK", &options).unwrap();
    assert!(keys_sent(&sender).iter().all(|&(vk, _)| vk != VK_BACK));
    assert_eq!(text_sent(&sender), "OK ");
}
