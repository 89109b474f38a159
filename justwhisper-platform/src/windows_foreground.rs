//! Foreground-app lookup, used only to annotate log entries (§8's log ring), not for any
//! context-injection feature.

#![cfg(windows)]

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW};

/// Best-effort title of the foreground window, or `None` if unavailable.
pub fn foreground_app_label() -> Option<String> {
    unsafe {
        let hwnd: HWND = GetForegroundWindow();
        if hwnd.0.is_null() {
            return None;
        }
        let len = GetWindowTextLengthW(hwnd);
        if len == 0 {
            return None;
        }
        let mut buf = vec![0u16; (len as usize) + 1];
        let copied = GetWindowTextW(hwnd, &mut buf).max(0) as usize;
        buf.truncate(copied);
        Some(String::from_utf16_lossy(&buf))
    }
}
