use serde::{Deserialize, Serialize};

/// Stable identifier for an audio input device, opaque across reboots/reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceUid(pub String);

impl DeviceUid {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The synthetic sentinel meaning "follow the OS default input device."
pub const DEFAULT_DEVICE_UID: &str = "__default__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub uid: DeviceUid,
    pub name: String,
    pub input_channels: u16,
}

impl AudioDevice {
    pub fn is_default(&self) -> bool {
        self.uid.0 == DEFAULT_DEVICE_UID
    }

    pub fn default_sentinel() -> Self {
        Self {
            uid: DeviceUid::new(DEFAULT_DEVICE_UID),
            name: "System Default".into(),
            input_channels: 1,
        }
    }

    /// §4.4 step 3: known-wireless devices need a settling delay before capture starts.
    pub fn is_known_wireless(&self) -> bool {
        let n = self.name.to_lowercase();
        n.contains("airpods") || n.contains("bluetooth")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    Paste,
    CopyOnly,
}

/// Intents produced by the Hotkey Controller (C5) and consumed by the Session Coordinator (C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    StartOrStop,
    StopCopyOnly,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Default for OverlayPosition {
    fn default() -> Self {
        OverlayPosition::BottomRight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self { r: 20, g: 20, b: 20, a: 230 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayAppearance {
    pub position: OverlayPosition,
    pub background: RgbaColor,
    pub opacity: f32,
}

impl Default for OverlayAppearance {
    fn default() -> Self {
        Self {
            position: OverlayPosition::default(),
            background: RgbaColor::default(),
            opacity: 0.9,
        }
    }
}

impl OverlayAppearance {
    /// Clamp opacity into the spec's [0.3, 1.0] range.
    pub fn clamp_opacity(mut self) -> Self {
        self.opacity = self.opacity.clamp(0.3, 1.0);
        self
    }
}

/// §3: a tagged union of the two supported Whisper-family providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SpeechProviderConfig {
    AzureWhisper {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
    OpenAiWhisper {
        api_key: String,
        model: String,
        base_url: String,
    },
}

impl SpeechProviderConfig {
    /// Invariant (§3): usable iff every string field is non-empty.
    pub fn is_usable(&self) -> bool {
        match self {
            SpeechProviderConfig::AzureWhisper { api_key, endpoint, deployment, api_version } => {
                !api_key.is_empty() && !endpoint.is_empty() && !deployment.is_empty() && !api_version.is_empty()
            }
            SpeechProviderConfig::OpenAiWhisper { api_key, model, base_url } => {
                !api_key.is_empty() && !model.is_empty() && !base_url.is_empty()
            }
        }
    }

    /// `Debug`-safe view that never prints the API key; pass to `log::*!` instead of `self`.
    pub fn redacted(&self) -> String {
        match self {
            SpeechProviderConfig::AzureWhisper { endpoint, deployment, api_version, .. } => format!(
                "AzureWhisper {{ api_key: <redacted>, endpoint: {endpoint:?}, deployment: {deployment:?}, api_version: {api_version:?} }}"
            ),
            SpeechProviderConfig::OpenAiWhisper { model, base_url, .. } => format!(
                "OpenAiWhisper {{ api_key: <redacted>, model: {model:?}, base_url: {base_url:?} }}"
            ),
        }
    }
}

/// §3 / §9 open question: one `ChatProvider` trait, two providers behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ChatProviderConfig {
    AzureChat {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
    OpenAiChat {
        api_key: String,
        model: String,
        base_url: String,
    },
}

impl ChatProviderConfig {
    pub fn is_usable(&self) -> bool {
        match self {
            ChatProviderConfig::AzureChat { api_key, endpoint, deployment, api_version } => {
                !api_key.is_empty() && !endpoint.is_empty() && !deployment.is_empty() && !api_version.is_empty()
            }
            ChatProviderConfig::OpenAiChat { api_key, model, base_url } => {
                !api_key.is_empty() && !model.is_empty() && !base_url.is_empty()
            }
        }
    }

    pub fn redacted(&self) -> String {
        match self {
            ChatProviderConfig::AzureChat { endpoint, deployment, api_version, .. } => format!(
                "AzureChat {{ api_key: <redacted>, endpoint: {endpoint:?}, deployment: {deployment:?}, api_version: {api_version:?} }}"
            ),
            ChatProviderConfig::OpenAiChat { model, base_url, .. } => format!(
                "OpenAiChat {{ api_key: <redacted>, model: {model:?}, base_url: {base_url:?} }}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_device_is_recognized() {
        let d = AudioDevice::default_sentinel();
        assert!(d.is_default());
    }

    #[test]
    fn wireless_name_detection_is_case_insensitive() {
        let d = AudioDevice {
            uid: DeviceUid::new("x"),
            name: "John's AirPods Pro".into(),
            input_channels: 1,
        };
        assert!(d.is_known_wireless());
    }

    #[test]
    fn usable_requires_all_fields_non_empty() {
        let cfg = SpeechProviderConfig::OpenAiWhisper {
            api_key: "".into(),
            model: "whisper-1".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        assert!(!cfg.is_usable());
    }

    #[test]
    fn redacted_never_contains_api_key() {
        let cfg = SpeechProviderConfig::OpenAiWhisper {
            api_key: "sk-super-secret".into(),
            model: "whisper-1".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        assert!(!cfg.redacted().contains("sk-super-secret"));
    }
}
