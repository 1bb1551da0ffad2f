//! Boundary between the engine and the operating system.
//!
//! The engine reads keyboard/mouse state through [`HookOracle`] and injects
//! through [`InputSink`]. [`RecordingPlatform`] runs headless; the Win32
//! backend is only built on Windows.

pub mod recording;

#[cfg(windows)]
pub mod hook;
#[cfg(windows)]
pub mod win32;

use std::time::Duration;

use crate::error::Result;
use crate::sender::types::*;

pub use recording::RecordingPlatform;
#[cfg(windows)]
pub use win32::Win32Platform;

/// Read-only view of keyboard, mouse and window state.
pub trait HookOracle {
    /// Whether the key is down right now, injected or physical.
    fn is_key_down_async(&self, vk: u8) -> bool;
    /// Toggle state of a lock key.
    fn is_key_toggled(&self, vk: u8) -> bool;
    fn has_keyboard_hook(&self) -> bool;
    /// Modifiers the hook has seen physically pressed.
    fn physical_modifiers(&self) -> ModifierMask;
    /// Another process has a low-level hook that could interleave with ours.
    fn other_hooks_present(&self) -> bool;
    /// Scan code with `0x100` marking extended keys; 0 when unmapped.
    fn map_vk_to_sc(&self, vk: u8, layout: LayoutId) -> u16;
    fn map_sc_to_vk(&self, sc: u16, layout: LayoutId) -> u8;
    fn focused_layout(&self, target: Option<WindowId>) -> LayoutId;
    fn layout_has_altgr(&self, layout: LayoutId) -> bool;
    /// Key and modifiers that type `ch`, if the layout has one.
    fn char_to_vk(&self, ch: char, layout: LayoutId) -> Option<(u8, ModifierMask)>;
    fn buttons_swapped(&self) -> bool;
    fn cursor_pos(&self) -> Point;
    /// Screen position of the origin used by `mode`.
    fn coord_origin(&self, mode: CoordMode, target: Option<WindowId>) -> Point;
    fn is_own_window(&self, window: WindowId) -> bool;
    /// Monotonic clock.
    fn now(&self) -> Duration;
}

/// Destination of synthesized events.
pub trait InputSink {
    /// Injects `events` atomically; returns how many were accepted.
    fn send_input(&mut self, events: &[EventRecord]) -> Result<usize>;
    /// Replays `events` in order, honoring delay markers.
    fn play(&mut self, events: &[EventRecord]) -> Result<()>;
    /// Uninterruptible sleep.
    fn sleep(&mut self, duration: Duration);
    /// Sleep that keeps the thread's messages flowing.
    fn wait(&mut self, duration: Duration);
}

pub trait Platform: HookOracle + InputSink {}

impl<T: HookOracle + InputSink> Platform for T {}
