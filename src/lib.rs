//! Keyboard and mouse input synthesis.
//!
//! [`Sender`] interprets send strings, clicks and moves and emits them
//! through a [`platform::Platform`] backend while keeping the modifier
//! ledger in step with what the OS believes is held down.

pub mod config;
pub mod error;
pub mod hotkey;
pub mod hotstring;
pub mod keys;
pub mod platform;
pub mod sender;

pub use config::{AppConfig, ThreadSettings};
pub use error::{Error, Result};
pub use hotkey::{Admission, Criterion, Trigger, TriggerKind, TriggerRegistry, Variant};
pub use hotstring::{HotstringCase, HotstringOptions, apply_case};
pub use platform::{HookOracle, InputSink, Platform, RecordingPlatform};
pub use sender::parsing::ClickSpec;
pub use sender::types::{
    ClickAction, CoordMode, EventRecord, KeyRecord, ModifierMask, MouseButton, MouseFlags,
    MouseRecord, Point, SendMode, SendRawMode, WindowId,
};
pub use sender::{SendOptions, Sender, resolve_send_mode};
