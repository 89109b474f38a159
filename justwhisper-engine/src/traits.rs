//! Capability traits the Session Coordinator (C8) depends on. Concrete implementations live
//! elsewhere: an adapter over `justwhisper-audio::AudioRecorder` provides `Recorder`, and
//! `justwhisper-platform`'s `macos_insert.rs`/`windows_insert.rs` provide `OutputSink`.

use async_trait::async_trait;
use justwhisper_core::{AudioDevice, OutputMode};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::watch;

/// §4.4 failure modes.
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error("microphone permission was not granted")]
    PermissionDenied,
    #[error("selected device is unavailable")]
    DeviceUnavailable,
    #[error("recording i/o failed: {0}")]
    IoFailure(String),
}

/// Handed back by `Recorder::stop`; the processing task reads the file at `path`.
#[derive(Debug, Clone)]
pub struct CapturedRecording {
    pub path: PathBuf,
    pub sample_rate_hz: u32,
}

#[async_trait]
pub trait Recorder: Send + Sync {
    /// §4.4 `start(device)`: allocate the scratch file, build the capture graph, retry once
    /// against the default device on failure.
    async fn start(&self, device: &AudioDevice) -> Result<(), RecorderError>;

    /// §4.4 `stop()`: flushes and closes the file. Idempotent.
    async fn stop(&self) -> Result<CapturedRecording, RecorderError>;

    /// Per-buffer normalized level (§4.4 step 5), consumed by the Overlay View Model.
    fn subscribe_level(&self) -> watch::Receiver<f32>;
}

#[derive(Debug, Clone, Error)]
pub enum OutputError {
    #[error("clipboard write failed: {0}")]
    Clipboard(String),
    #[error("paste synthesis failed: {0}")]
    Paste(String),
}

/// §4.9: clear the clipboard and write `text`; if `mode == Paste`, wait 50ms for the clipboard
/// to settle, then synthesize the host OS paste keystroke.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError>;
}
