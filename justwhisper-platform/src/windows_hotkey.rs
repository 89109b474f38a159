//! Windows global hotkey interception (C5) via a low-level keyboard hook
//! (`WH_KEYBOARD_LL`).
//!
//! Fn is not a deliverable virtual-key on most Windows keyboards, so the Windows Primary
//! default is Scroll Lock: a dedicated, rarely bound toggle key. CopyOnly (left Control) and
//! Cancel (Escape) match the macOS keycodes in spirit; both are swallowed while recording by
//! returning a nonzero value from the hook instead of calling `CallNextHookEx`.

#![cfg(windows)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use justwhisper_core::Intent;
use tokio::sync::mpsc;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{VK_ESCAPE, VK_LCONTROL, VK_SCROLL};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, PeekMessageW, SetWindowsHookExW, TranslateMessage,
    UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, PM_REMOVE, WH_KEYBOARD_LL, WM_KEYDOWN,
};

const VK_PRIMARY: u16 = VK_SCROLL.0;
const VK_COPY_ONLY: u16 = VK_LCONTROL.0;
const VK_CANCEL: u16 = VK_ESCAPE.0;

static IS_RECORDING: AtomicBool = AtomicBool::new(false);
static EVENT_SENDER: OnceLock<std::sync::mpsc::Sender<Intent>> = OnceLock::new();

pub struct WindowsHotkeyController {
    stop_flag: Arc<AtomicBool>,
}

impl WindowsHotkeyController {
    pub fn new() -> Self {
        Self { stop_flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn reset_recording_state(&self, is_recording: bool) {
        IS_RECORDING.store(is_recording, Ordering::SeqCst);
    }

    /// §4.5 permission gating: Windows has no input-monitoring gate, so `permission_granted` is
    /// expected to resolve immediately; the retry loop is kept for parity with macOS.
    pub fn start(&self, permission_granted: impl Fn() -> bool + Send + 'static) -> mpsc::Receiver<Intent> {
        let (tx, rx) = mpsc::channel(32);
        let (std_tx, std_rx) = std::sync::mpsc::channel::<Intent>();
        let _ = EVENT_SENDER.set(std_tx);
        let stop_flag = self.stop_flag.clone();

        std::thread::spawn(move || {
            while !permission_granted() {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                std::thread::sleep(Duration::from_secs(2));
            }
            if let Err(e) = run_hook_loop(stop_flag) {
                log::error!("windows hotkey hook failed: {e}");
            }
        });

        std::thread::spawn(move || {
            while let Ok(intent) = std_rx.recv() {
                if tx.blocking_send(intent).is_err() {
                    return;
                }
            }
        });

        rx
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Default for WindowsHotkeyController {
    fn default() -> Self {
        Self::new()
    }
}

unsafe extern "system" fn keyboard_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 && wparam.0 as u32 == WM_KEYDOWN {
        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        let vk = info.vkCode as u16;
        let recording = IS_RECORDING.load(Ordering::SeqCst);

        if vk == VK_PRIMARY {
            if let Some(tx) = EVENT_SENDER.get() {
                let _ = tx.send(Intent::StartOrStop);
            }
        } else if recording && vk == VK_COPY_ONLY {
            if let Some(tx) = EVENT_SENDER.get() {
                let _ = tx.send(Intent::StopCopyOnly);
            }
            return LRESULT(1);
        } else if recording && vk == VK_CANCEL {
            if let Some(tx) = EVENT_SENDER.get() {
                let _ = tx.send(Intent::Cancel);
            }
            return LRESULT(1);
        }
    }

    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

fn run_hook_loop(stop_flag: Arc<AtomicBool>) -> anyhow::Result<()> {
    let hook: HHOOK = unsafe {
        let module = GetModuleHandleW(None).map_err(|e| anyhow::anyhow!("GetModuleHandleW failed: {e}"))?;
        SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), Some(module.into()), 0)
            .map_err(|e| anyhow::anyhow!("SetWindowsHookExW failed: {e}"))?
    };

    let mut msg = MSG::default();
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }
        // PeekMessageW (non-blocking) lets us poll the stop flag between pumps, unlike
        // GetMessageW which would block the thread indefinitely.
        let has_message = unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool();
        if has_message {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        } else {
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    unsafe {
        let _ = UnhookWindowsHookEx(hook);
    }
    Ok(())
}
