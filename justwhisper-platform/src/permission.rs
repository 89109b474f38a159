//! Platform `PermissionProbe` implementations consumed by
//! `justwhisper_engine::permission::PermissionGate`.

use async_trait::async_trait;
use justwhisper_engine::permission::{Permission, PermissionProbe, PermissionStatus};

#[cfg(target_os = "macos")]
#[link(name = "AVFoundation", kind = "framework")]
unsafe extern "C" {}

#[cfg(target_os = "macos")]
mod macos {
    use super::*;
    use objc2::runtime::AnyObject;
    use core_foundation::base::TCFType;
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::string::CFString;

    #[link(name = "ApplicationServices", kind = "framework")]
    unsafe extern "C" {
        fn AXIsProcessTrustedWithOptions(options: *const AnyObject) -> bool;
        static kAXTrustedCheckOptionPrompt: *const AnyObject;
    }

    fn accessibility_status(prompt: bool) -> PermissionStatus {
        let trusted = unsafe {
            let key = CFString::wrap_under_create_rule(kAXTrustedCheckOptionPrompt.cast());
            let value = if prompt {
                core_foundation::boolean::CFBoolean::true_value()
            } else {
                core_foundation::boolean::CFBoolean::false_value()
            };
            let options = CFDictionary::from_CFType_pairs(&[(key, value)]);
            AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef().cast())
        };
        if trusted { PermissionStatus::Granted } else { PermissionStatus::Denied }
    }

    // `AVCaptureDevice.authorizationStatus(for: .audio)`: 0 notDetermined, 1 restricted,
    // 2 denied, 3 authorized.
    fn microphone_status() -> PermissionStatus {
        use objc2::{class, msg_send};
        let status: i64 = unsafe {
            let media_type = objc2_foundation::NSString::from_str("soun");
            msg_send![class!(AVCaptureDevice), authorizationStatusForMediaType: &*media_type]
        };
        match status {
            3 => PermissionStatus::Granted,
            2 | 1 => PermissionStatus::Denied,
            _ => PermissionStatus::Undetermined,
        }
    }

    fn request_microphone() {
        use objc2::{class, msg_send};
        unsafe {
            let media_type = objc2_foundation::NSString::from_str("soun");
            let _: () = msg_send![class!(AVCaptureDevice), requestAccessForMediaType: &*media_type, completionHandler: std::ptr::null::<AnyObject>()];
        }
    }

    #[derive(Debug, Default)]
    pub struct MacosPermissionProbe;

    #[async_trait]
    impl PermissionProbe for MacosPermissionProbe {
        fn status(&self, permission: Permission) -> PermissionStatus {
            match permission {
                Permission::Microphone => microphone_status(),
                Permission::InputMonitoring => accessibility_status(false),
            }
        }

        async fn request(&self, permission: Permission) {
            match permission {
                Permission::Microphone => request_microphone(),
                // Accessibility has no programmatic grant; re-checking with `prompt: true`
                // surfaces the System Settings prompt if not yet determined.
                Permission::InputMonitoring => {
                    accessibility_status(true);
                }
            }
        }
    }
}

#[cfg(target_os = "macos")]
pub use macos::MacosPermissionProbe;

/// Windows has no OS-level microphone/input-monitoring gate comparable to macOS's TCC, so both
/// permissions read as always-granted.
#[cfg(windows)]
#[derive(Debug, Default)]
pub struct WindowsPermissionProbe;

#[cfg(windows)]
#[async_trait]
impl PermissionProbe for WindowsPermissionProbe {
    fn status(&self, _permission: Permission) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self, _permission: Permission) {}
}
