//! Foreground-app lookup, used only to annotate log entries (§8's log ring), not for any
//! context-injection feature.

#![cfg(target_os = "macos")]

use objc2::rc::Retained;
use objc2_app_kit::{NSRunningApplication, NSWorkspace};

/// Best-effort localized name of the frontmost application, or `None` if unavailable.
pub fn foreground_app_label() -> Option<String> {
    let app: Option<Retained<NSRunningApplication>> =
        unsafe { NSWorkspace::sharedWorkspace().frontmostApplication() };
    let app = app?;
    unsafe { app.localizedName() }.map(|name| name.to_string())
}
