//! Low-level keyboard hook that tracks which modifiers are physically held.
//!
//! Injected events (ours or anyone else's) never touch the physical view.
//! While installed, the hook owns a named mutex so that another engine
//! instance can tell its batches are no longer uninterruptible.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::{
    CreateMutexW, GetCurrentThreadId, OpenMutexW, SYNCHRONIZATION_SYNCHRONIZE,
};
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::{PCWSTR, w};

use crate::error::{Error, Result};
use crate::sender::types::ModifierMask;

const HOOK_MUTEX_NAME: PCWSTR = w!("Local\\keysend-keyboard-hook");

static PHYSICAL: AtomicU8 = AtomicU8::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Modifiers physically held, as seen by the hook.
pub fn physical_modifiers() -> ModifierMask {
    ModifierMask::from_bits_retain(PHYSICAL.load(Ordering::Acquire))
}

#[inline]
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Whether some other process holds the hook mutex.
pub fn foreign_hook_present() -> bool {
    if is_installed() {
        // Our own mutex would answer for us.
        return false;
    }
    match unsafe { OpenMutexW(SYNCHRONIZATION_SYNCHRONIZE, false, HOOK_MUTEX_NAME) } {
        Ok(handle) => {
            let _ = unsafe { CloseHandle(handle) };
            true
        }
        Err(_) => false,
    }
}

pub struct KeyboardHook {
    hook_handle: HHOOK,
    mutex: HANDLE,
}

unsafe impl Send for KeyboardHook {}

impl KeyboardHook {
    pub fn new() -> Result<Self> {
        unsafe {
            let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(Self::keyboard_proc), None, 0)
                .map_err(|e| Error::Platform(format!("failed to set keyboard hook: {}", e)))?;
            if hook.0.is_null() {
                return Err(Error::Platform("failed to set keyboard hook".into()));
            }
            let mutex = CreateMutexW(None, false, HOOK_MUTEX_NAME)
                .map_err(|e| Error::Platform(format!("failed to create hook mutex: {}", e)))?;

            INSTALLED.store(true, Ordering::Release);
            Ok(Self {
                hook_handle: hook,
                mutex,
            })
        }
    }

    /// Installs the hook on a dedicated thread running its message loop.
    ///
    /// Returns the thread id, which can be sent `WM_QUIT` to remove the hook.
    pub fn spawn() -> Result<u32> {
        let (tx, rx) = bounded(1);
        thread::Builder::new()
            .name("keyboard_hook".into())
            .spawn(move || match Self::new() {
                Ok(hook) => {
                    let _ = tx.send(Ok(unsafe { GetCurrentThreadId() }));
                    hook.run_message_loop();
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                }
            })?;

        let thread_id = rx
            .recv()
            .map_err(|_| Error::Platform("hook thread exited during start-up".into()))??;
        info!(thread_id, "keyboard hook installed");
        Ok(thread_id)
    }

    pub fn run_message_loop(self) {
        unsafe {
            let mut msg = MSG::default();
            loop {
                let result = GetMessageW(&mut msg, None, 0, 0);
                if result.0 == 0 || result.0 == -1 {
                    break;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        debug!("keyboard hook message loop finished");
    }

    unsafe extern "system" fn keyboard_proc(
        code: i32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        if code < 0 {
            return unsafe { CallNextHookEx(None, code, w_param, l_param) };
        }

        let kb_struct = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };

        // Skip injected key events
        if (kb_struct.flags & LLKHF_INJECTED).0 == 0 {
            let bit = ModifierMask::from_vk(kb_struct.vkCode as u8);
            if !bit.is_empty() {
                match w_param.0 as u32 {
                    WM_KEYDOWN | WM_SYSKEYDOWN => {
                        PHYSICAL.fetch_or(bit.bits(), Ordering::AcqRel);
                    }
                    WM_KEYUP | WM_SYSKEYUP => {
                        PHYSICAL.fetch_and(!bit.bits(), Ordering::AcqRel);
                    }
                    _ => {}
                }
            }
        }

        unsafe { CallNextHookEx(None, code, w_param, l_param) }
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        INSTALLED.store(false, Ordering::Release);
        PHYSICAL.store(0, Ordering::Release);
        unsafe {
            if let Err(e) = UnhookWindowsHookEx(self.hook_handle) {
                warn!(error = %e, "failed to remove keyboard hook");
            }
            let _ = CloseHandle(self.mutex);
        }
    }
}
