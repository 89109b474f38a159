//! Cross-platform test doubles for the Output Sink (C9), used by `justwhisper-cli` and
//! integration tests that don't want to touch the real clipboard.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use justwhisper_core::{AudioDevice, OutputMode};
use justwhisper_engine::permission::{Permission, PermissionProbe, PermissionStatus};
use justwhisper_engine::traits::{CapturedRecording, Recorder, RecorderError};
use justwhisper_engine::traits::{OutputError, OutputSink};
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct StdoutOutputSink;

#[async_trait]
impl OutputSink for StdoutOutputSink {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
        println!("[output:{mode:?}] {text}");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryOutputSink {
    pub emitted: Mutex<Vec<(String, OutputMode)>>,
}

impl MemoryOutputSink {
    pub fn boxed() -> Arc<dyn OutputSink> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl OutputSink for MemoryOutputSink {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
        self.emitted.lock().unwrap().push((text.to_string(), mode));
        Ok(())
    }
}

/// A `Recorder` that never produces audio, for hosts with no capture backend (e.g. Linux, where
/// this crate has no `justwhisper-audio` capture graph wired up yet).
#[derive(Debug, Default)]
pub struct NullRecorder {
    level_tx: std::sync::OnceLock<watch::Sender<f32>>,
}

impl NullRecorder {
    fn level_tx(&self) -> &watch::Sender<f32> {
        self.level_tx.get_or_init(|| watch::channel(0.0).0)
    }
}

#[async_trait]
impl Recorder for NullRecorder {
    async fn start(&self, _device: &AudioDevice) -> Result<(), RecorderError> {
        Err(RecorderError::DeviceUnavailable)
    }

    async fn stop(&self) -> Result<CapturedRecording, RecorderError> {
        Err(RecorderError::DeviceUnavailable)
    }

    fn subscribe_level(&self) -> watch::Receiver<f32> {
        self.level_tx().subscribe()
    }
}

/// Always-granted `PermissionProbe`, for hosts with no OS-level privacy gate to query.
#[derive(Debug, Default)]
pub struct AlwaysGrantedProbe;

#[async_trait]
impl PermissionProbe for AlwaysGrantedProbe {
    fn status(&self, _permission: Permission) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self, _permission: Permission) {}
}
