//! Wire-format DTOs shared between the Session Coordinator (C8) and UI shells (Tauri commands,
//! CLI status output). Kept separate from `justwhisper-engine`'s internal state machine so the
//! coordinator's own types never need to derive `Serialize`.

use serde::{Deserialize, Serialize};

use justwhisper_core::{Intent, LogEntry, Severity};
use justwhisper_engine::{MessageKind, OverlayState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDto {
    StartOrStop,
    StopCopyOnly,
    Cancel,
}

impl From<IntentDto> for Intent {
    fn from(dto: IntentDto) -> Self {
        match dto {
            IntentDto::StartOrStop => Intent::StartOrStop,
            IntentDto::StopCopyOnly => Intent::StopCopyOnly,
            IntentDto::Cancel => Intent::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKindDto {
    Info,
    Error,
    Success,
}

impl From<MessageKind> for MessageKindDto {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Info => MessageKindDto::Info,
            MessageKind::Error => MessageKindDto::Error,
            MessageKind::Success => MessageKindDto::Success,
        }
    }
}

/// A point-in-time view of the overlay, serialized for `window.emit`/CLI status printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OverlaySnapshot {
    Idle,
    Recording { level: f32 },
    Thinking,
    Message { kind: MessageKindDto, text: String },
}

impl From<OverlayState> for OverlaySnapshot {
    fn from(state: OverlayState) -> Self {
        match state {
            OverlayState::Idle => OverlaySnapshot::Idle,
            OverlayState::Recording { level } => OverlaySnapshot::Recording { level },
            OverlayState::Thinking => OverlaySnapshot::Thinking,
            OverlayState::Message { kind, text } => {
                OverlaySnapshot::Message { kind: kind.into(), text }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityDto {
    Info,
    Warn,
    Error,
}

impl From<Severity> for SeverityDto {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Info => SeverityDto::Info,
            Severity::Warn => SeverityDto::Warn,
            Severity::Error => SeverityDto::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryDto {
    pub timestamp_millis: u64,
    pub severity: SeverityDto,
    pub message: String,
}

impl From<LogEntry> for LogEntryDto {
    fn from(entry: LogEntry) -> Self {
        Self {
            timestamp_millis: entry.timestamp_millis,
            severity: entry.severity.into(),
            message: entry.message,
        }
    }
}

pub fn log_snapshot_dto(entries: Vec<LogEntry>) -> Vec<LogEntryDto> {
    entries.into_iter().map(LogEntryDto::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_snapshot_roundtrips_through_json() {
        let snap = OverlaySnapshot::Recording { level: 0.42 };
        let json = serde_json::to_string(&snap).unwrap();
        let back: OverlaySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }

    #[test]
    fn intent_dto_maps_to_core_intent() {
        assert_eq!(Intent::from(IntentDto::Cancel), Intent::Cancel);
    }
}
