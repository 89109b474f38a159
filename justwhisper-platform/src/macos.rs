//! macOS platform implementations: Hotkey Controller (C5), Output Sink (C9), permission probe.

mod macos_foreground;
mod macos_hotkey;
mod macos_insert;

pub use macos_foreground::foreground_app_label;
pub use macos_hotkey::MacosHotkeyController;
pub use macos_insert::MacosOutputSink;
