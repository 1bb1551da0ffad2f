//! Win32 backend: `SendInput` injection and OS key/window state queries.

use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;
use windows::Win32::Foundation::{GetLastError, HWND, POINT, RECT};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::*;

use super::{HookOracle, InputSink, hook};
use crate::error::{Error, Result};
use crate::keys;
use crate::sender::types::*;

pub struct Win32Platform {
    start: Instant,
}

impl Default for Win32Platform {
    fn default() -> Self {
        Self::new()
    }
}

impl Win32Platform {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn hwnd(target: Option<WindowId>) -> HWND {
        match target {
            Some(WindowId(id)) => HWND(id as *mut _),
            None => unsafe { GetForegroundWindow() },
        }
    }

    fn hkl(layout: LayoutId) -> HKL {
        HKL(layout.0 as *mut _)
    }

    fn to_input(record: &EventRecord) -> Option<INPUT> {
        match record {
            EventRecord::Key(key) => {
                let mut flags = KEYBD_EVENT_FLAGS(0);
                let (vk, scan) = if key.unicode {
                    flags |= KEYEVENTF_UNICODE;
                    (VIRTUAL_KEY(0), key.sc)
                } else {
                    if key.extended {
                        flags |= KEYEVENTF_EXTENDEDKEY;
                    }
                    (VIRTUAL_KEY(key.vk as u16), key.sc & 0xFF)
                };
                if key.key_up {
                    flags |= KEYEVENTF_KEYUP;
                }
                Some(INPUT {
                    r#type: INPUT_KEYBOARD,
                    Anonymous: INPUT_0 {
                        ki: KEYBDINPUT {
                            wVk: vk,
                            wScan: scan,
                            dwFlags: flags,
                            time: 0,
                            dwExtraInfo: key.extra_info as usize,
                        },
                    },
                })
            }
            EventRecord::Mouse(mouse) => {
                let (dx, dy) = if mouse.flags.contains(MouseFlags::ABSOLUTE) {
                    Self::normalize(mouse.x, mouse.y)
                } else {
                    (mouse.x, mouse.y)
                };
                Some(INPUT {
                    r#type: INPUT_MOUSE,
                    Anonymous: INPUT_0 {
                        mi: MOUSEINPUT {
                            dx,
                            dy,
                            mouseData: mouse.data as u32,
                            dwFlags: MOUSE_EVENT_FLAGS(mouse.flags.bits()),
                            time: 0,
                            dwExtraInfo: mouse.extra_info as usize,
                        },
                    },
                })
            }
            EventRecord::Delay(_) => None,
        }
    }

    /// Pixels to the 0..=65535 range absolute moves use.
    fn normalize(x: i32, y: i32) -> (i32, i32) {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        let scale = |value: i32, extent: i32| {
            if extent <= 1 {
                return 0;
            }
            ((value as i64 * 65535) / (extent as i64 - 1))
                .clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        (scale(x, width), scale(y, height))
    }

    fn inject(inputs: &[INPUT]) -> Result<usize> {
        if inputs.is_empty() {
            return Ok(0);
        }
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            let err = unsafe { GetLastError() };
            return Err(Error::Platform(format!("SendInput failed: {:?}", err)));
        }
        Ok(sent as usize)
    }

    fn pump_messages() {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

impl HookOracle for Win32Platform {
    fn is_key_down_async(&self, vk: u8) -> bool {
        unsafe { GetAsyncKeyState(vk as i32) as u16 & 0x8000 != 0 }
    }

    fn is_key_toggled(&self, vk: u8) -> bool {
        unsafe { GetKeyState(vk as i32) & 1 != 0 }
    }

    fn has_keyboard_hook(&self) -> bool {
        hook::is_installed()
    }

    fn physical_modifiers(&self) -> ModifierMask {
        hook::physical_modifiers()
    }

    fn other_hooks_present(&self) -> bool {
        hook::foreign_hook_present()
    }

    fn map_vk_to_sc(&self, vk: u8, layout: LayoutId) -> u16 {
        let sc = unsafe { MapVirtualKeyExW(vk as u32, MAPVK_VK_TO_VSC_EX, Some(Self::hkl(layout))) };
        match sc {
            0 => keys::vk_to_sc(vk),
            sc if sc & 0xFF00 != 0 => (sc & 0xFF) as u16 | 0x100,
            sc => sc as u16,
        }
    }

    fn map_sc_to_vk(&self, sc: u16, layout: LayoutId) -> u8 {
        let code = if keys::is_extended_sc(sc) {
            0xE000 | (sc as u32 & 0xFF)
        } else {
            sc as u32
        };
        let vk = unsafe { MapVirtualKeyExW(code, MAPVK_VSC_TO_VK_EX, Some(Self::hkl(layout))) };
        match vk {
            0 => keys::sc_to_vk(sc),
            vk => vk as u8,
        }
    }

    fn focused_layout(&self, target: Option<WindowId>) -> LayoutId {
        unsafe {
            let thread_id = GetWindowThreadProcessId(Self::hwnd(target), None);
            LayoutId(GetKeyboardLayout(thread_id).0 as usize)
        }
    }

    fn layout_has_altgr(&self, layout: LayoutId) -> bool {
        let hkl = Self::hkl(layout);
        (0x20u16..=0xFF).any(|ch| {
            let scan = unsafe { VkKeyScanExW(ch, hkl) };
            scan != -1 && (scan >> 8) & 0x06 == 0x06
        })
    }

    fn char_to_vk(&self, ch: char, layout: LayoutId) -> Option<(u8, ModifierMask)> {
        let unit = u16::try_from(ch as u32).ok()?;
        let scan = unsafe { VkKeyScanExW(unit, Self::hkl(layout)) };
        if scan == -1 {
            return None;
        }
        let state = (scan >> 8) & 0xFF;
        if state & !0x07 != 0 {
            return None;
        }
        let mut mods = ModifierMask::empty();
        mods.set(ModifierMask::LSHIFT, state & 0x01 != 0);
        mods.set(ModifierMask::LCONTROL, state & 0x02 != 0);
        mods.set(ModifierMask::LALT, state & 0x04 != 0);
        Some(((scan & 0xFF) as u8, mods))
    }

    fn buttons_swapped(&self) -> bool {
        unsafe { GetSystemMetrics(SM_SWAPBUTTON) != 0 }
    }

    fn cursor_pos(&self) -> Point {
        let mut pt = POINT::default();
        match unsafe { GetCursorPos(&mut pt) } {
            Ok(()) => Point::new(pt.x, pt.y),
            Err(e) => {
                warn!(error = %e, "GetCursorPos failed");
                Point::default()
            }
        }
    }

    fn coord_origin(&self, mode: CoordMode, target: Option<WindowId>) -> Point {
        let hwnd = Self::hwnd(target);
        match mode {
            CoordMode::Screen => Point::default(),
            CoordMode::Window => {
                let mut rect = RECT::default();
                match unsafe { GetWindowRect(hwnd, &mut rect) } {
                    Ok(()) => Point::new(rect.left, rect.top),
                    Err(_) => Point::default(),
                }
            }
            CoordMode::Client => {
                let mut pt = POINT::default();
                if unsafe { ClientToScreen(hwnd, &mut pt) }.as_bool() {
                    Point::new(pt.x, pt.y)
                } else {
                    Point::default()
                }
            }
        }
    }

    fn is_own_window(&self, window: WindowId) -> bool {
        let mut pid = 0u32;
        unsafe {
            GetWindowThreadProcessId(HWND(window.0 as *mut _), Some(&mut pid));
            pid != 0 && pid == GetCurrentProcessId()
        }
    }

    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

impl InputSink for Win32Platform {
    fn send_input(&mut self, events: &[EventRecord]) -> Result<usize> {
        let inputs: Vec<INPUT> = events.iter().filter_map(Self::to_input).collect();
        Self::inject(&inputs)
    }

    /// Journal playback is unavailable on current Windows, so the batch is
    /// replayed event by event with its delay markers honored.
    fn play(&mut self, events: &[EventRecord]) -> Result<()> {
        for event in events {
            match event {
                EventRecord::Delay(ms) => thread::sleep(Duration::from_millis(*ms as u64)),
                other => {
                    if let Some(input) = Self::to_input(other) {
                        Self::inject(std::slice::from_ref(&input))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn wait(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            Self::pump_messages();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(1)));
        }
    }
}
