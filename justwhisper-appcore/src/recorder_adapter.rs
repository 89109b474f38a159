//! Adapts `justwhisper_audio::AudioRecorder` to the engine's [`Recorder`] trait (C4 -> C8
//! boundary). Kept out of `justwhisper-engine` itself so the coordinator never depends on cpal.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use justwhisper_audio::{AudioCaptureError, AudioRecorder};
use justwhisper_core::AudioDevice;
use justwhisper_engine::traits::{CapturedRecording, Recorder, RecorderError};
use tokio::sync::{watch, Mutex};

fn map_error(e: AudioCaptureError) -> RecorderError {
    match e {
        AudioCaptureError::PermissionDenied => RecorderError::PermissionDenied,
        AudioCaptureError::NoInputDevice | AudioCaptureError::DeviceUnavailable => {
            RecorderError::DeviceUnavailable
        }
        other => RecorderError::IoFailure(other.to_string()),
    }
}

pub struct AudioRecorderAdapter {
    scratch_dir: PathBuf,
    counter: AtomicU64,
    level_tx: watch::Sender<f32>,
    current: Mutex<Option<AudioRecorder>>,
}

impl AudioRecorderAdapter {
    pub fn new(scratch_dir: PathBuf) -> Self {
        let (level_tx, _) = watch::channel(0.0);
        Self { scratch_dir, counter: AtomicU64::new(0), level_tx, current: Mutex::new(None) }
    }

    fn next_scratch_path(&self) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!("capture-{n}.raw"))
    }
}

#[async_trait]
impl Recorder for AudioRecorderAdapter {
    async fn start(&self, device: &AudioDevice) -> Result<(), RecorderError> {
        std::fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| RecorderError::IoFailure(e.to_string()))?;

        let path = self.next_scratch_path();
        let device = device.clone();

        let recorder = tokio::task::spawn_blocking(move || AudioRecorder::start(&device, path))
            .await
            .map_err(|e| RecorderError::IoFailure(e.to_string()))?
            .map_err(map_error)?;

        let level_tx = self.level_tx.clone();
        recorder.set_level_callback(move |level| {
            let _ = level_tx.send(level);
        });
        recorder.begin().map_err(map_error)?;

        *self.current.lock().await = Some(recorder);
        Ok(())
    }

    async fn stop(&self) -> Result<CapturedRecording, RecorderError> {
        let recorder = self
            .current
            .lock()
            .await
            .take()
            .ok_or_else(|| RecorderError::IoFailure("no recording in progress".into()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let result = recorder.stop();
            let _ = recorder.close();
            result
        })
        .await
        .map_err(|e| RecorderError::IoFailure(e.to_string()))?
        .map_err(map_error)?;

        Ok(CapturedRecording { path: handle.output_path, sample_rate_hz: handle.sample_rate_hz })
    }

    fn subscribe_level(&self) -> watch::Receiver<f32> {
        self.level_tx.subscribe()
    }
}

pub fn boxed(scratch_dir: PathBuf) -> Arc<dyn Recorder> {
    Arc::new(AudioRecorderAdapter::new(scratch_dir))
}
