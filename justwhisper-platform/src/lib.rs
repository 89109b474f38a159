pub mod permission;
pub mod test;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{foreground_app_label, MacosHotkeyController, MacosOutputSink};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{foreground_app_label, WindowsHotkeyController, WindowsOutputSink};

#[cfg(target_os = "macos")]
pub use permission::MacosPermissionProbe;
#[cfg(windows)]
pub use permission::WindowsPermissionProbe;
