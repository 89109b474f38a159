use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChatProviderConfig, DeviceUid, OverlayAppearance, SpeechProviderConfig};

/// §3 `CleanerOptions`: immutable snapshot of the flags controlling the C6 pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerOptions {
    pub remove_fillers: bool,
    pub process_line_break_commands: bool,
    pub process_punctuation_commands: bool,
    pub process_formatting_commands: bool,
    pub apply_self_correction: bool,
    pub automatic_capitalization: bool,
    pub apply_word_replacements: bool,
    pub use_intelligent_word_replacements: bool,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        Self {
            remove_fillers: true,
            process_line_break_commands: true,
            process_punctuation_commands: true,
            process_formatting_commands: true,
            apply_self_correction: true,
            automatic_capitalization: true,
            apply_word_replacements: true,
            use_intelligent_word_replacements: false,
        }
    }
}

/// §3 `WordReplacements`: lowercased search phrase -> replacement phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordReplacements(pub HashMap<String, String>);

impl WordReplacements {
    pub fn seed_defaults() -> Self {
        // A handful of common proper-noun corrections; the user grows this list over time.
        let mut map = HashMap::new();
        map.insert("whisper gpt".into(), "WhisperGPT".into());
        map.insert("open ai".into(), "OpenAI".into());
        Self(map)
    }
}

/// §4.1: the full set of durable, observable user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub enabled: bool,
    pub speech_provider: SpeechProviderConfig,
    pub chat_provider: ChatProviderConfig,
    #[serde(default)]
    pub use_llm_enhancement: bool,
    pub cleaner: CleanerOptions,
    pub word_replacements: WordReplacements,
    pub overlay: OverlayAppearance,
    pub selected_device_uid: DeviceUid,
}

impl AppConfig {
    pub fn new_default() -> Self {
        Self {
            enabled: true,
            speech_provider: SpeechProviderConfig::OpenAiWhisper {
                api_key: String::new(),
                model: "whisper-1".into(),
                base_url: "https://api.openai.com/v1".into(),
            },
            chat_provider: ChatProviderConfig::OpenAiChat {
                api_key: String::new(),
                model: "gpt-4o-mini".into(),
                base_url: "https://api.openai.com/v1".into(),
            },
            use_llm_enhancement: false,
            cleaner: CleanerOptions::default(),
            word_replacements: WordReplacements::seed_defaults(),
            overlay: OverlayAppearance::default(),
            selected_device_uid: DeviceUid::new(crate::types::DEFAULT_DEVICE_UID),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = AppConfig::new_default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn seeded_word_replacements_are_non_empty() {
        assert!(!WordReplacements::seed_defaults().0.is_empty());
    }
}
