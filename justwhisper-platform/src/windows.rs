//! Windows platform implementations: Hotkey Controller (C5), Output Sink (C9), permission probe.
//!
//! Kept behind `cfg(windows)` so the workspace builds cleanly on other hosts.

#[path = "windows_foreground.rs"]
mod windows_foreground;
#[path = "windows_hotkey.rs"]
mod windows_hotkey;
#[path = "windows_insert.rs"]
mod windows_insert;

pub use windows_foreground::foreground_app_label;
pub use windows_hotkey::WindowsHotkeyController;
pub use windows_insert::WindowsOutputSink;
