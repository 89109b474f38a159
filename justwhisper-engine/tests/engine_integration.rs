use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use justwhisper_core::{AppConfig, AudioDevice, ChatProviderConfig, Intent, OutputMode, SpeechProviderConfig};
use justwhisper_engine::permission::{Permission, PermissionGate, PermissionProbe, PermissionStatus};
use justwhisper_engine::traits::{CapturedRecording, OutputError, OutputSink, Recorder, RecorderError};
use justwhisper_engine::{OverlayViewModel, SessionCoordinator, SessionState};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct AlwaysGrantedProbe;

#[async_trait]
impl PermissionProbe for AlwaysGrantedProbe {
    fn status(&self, _permission: Permission) -> PermissionStatus {
        PermissionStatus::Granted
    }
    async fn request(&self, _permission: Permission) {}
}

/// Hands back a fixed scratch file of silent PCM on `stop`, as if a real capture had just run.
struct FixedRecorder {
    level_tx: watch::Sender<f32>,
    scratch: tempfile::TempDir,
}

#[async_trait]
impl Recorder for FixedRecorder {
    async fn start(&self, _device: &AudioDevice) -> Result<(), RecorderError> {
        Ok(())
    }

    async fn stop(&self) -> Result<CapturedRecording, RecorderError> {
        let path = self.scratch.path().join("capture.raw");
        let samples = vec![0.0_f32; 1600];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        std::fs::write(&path, bytes).map_err(|e| RecorderError::IoFailure(e.to_string()))?;
        Ok(CapturedRecording { path, sample_rate_hz: 16_000 })
    }

    fn subscribe_level(&self) -> watch::Receiver<f32> {
        self.level_tx.subscribe()
    }
}

#[derive(Default)]
struct MemoryOutput {
    emitted: Mutex<Vec<(String, OutputMode)>>,
}

#[async_trait]
impl OutputSink for MemoryOutput {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
        self.emitted.lock().unwrap().push((text.to_string(), mode));
        Ok(())
    }
}

async fn wait_for<F: Fn() -> bool>(pred: F) {
    for _ in 0..50 {
        if pred() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn end_to_end_session_transcribes_and_enhances_through_mocked_providers() {
    let speech_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"text":"rewrite um hello team this is a quick update rewrite"}"#,
            "application/json",
        ))
        .mount(&speech_server)
        .await;

    let chat_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"choices":[{"message":{"content":"Hello team, this is a quick update."}}]}"#,
            "application/json",
        ))
        .mount(&chat_server)
        .await;

    let mut config = AppConfig::new_default();
    config.speech_provider = SpeechProviderConfig::OpenAiWhisper {
        api_key: "sk-test".into(),
        model: "whisper-1".into(),
        base_url: speech_server.uri(),
    };
    config.chat_provider = ChatProviderConfig::OpenAiChat {
        api_key: "sk-test".into(),
        model: "gpt-4o-mini".into(),
        base_url: chat_server.uri(),
    };
    config.use_llm_enhancement = true;

    let (level_tx, _) = watch::channel(0.0_f32);
    let recorder: Arc<dyn Recorder> =
        Arc::new(FixedRecorder { level_tx, scratch: tempfile::tempdir().unwrap() });
    let output = Arc::new(MemoryOutput::default());
    let permissions = PermissionGate::start(Arc::new(AlwaysGrantedProbe));
    let view_model = OverlayViewModel::new(config.overlay.clone());
    let coordinator = SessionCoordinator::new(recorder, output.clone(), permissions, view_model);

    let device = AudioDevice::default_sentinel();
    coordinator.handle_intent(Intent::StartOrStop, config.clone(), device.clone()).await;
    assert!(matches!(coordinator.state().await, SessionState::Recording { .. }));

    coordinator.handle_intent(Intent::StartOrStop, config, device).await;

    wait_for(|| !output.emitted.lock().unwrap().is_empty()).await;

    let emitted = output.emitted.lock().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].0, "Hello team, this is a quick update.");
    assert_eq!(emitted[0].1, OutputMode::Paste);
}

#[tokio::test]
async fn cancel_during_recording_never_reaches_the_output_sink() {
    let (level_tx, _) = watch::channel(0.0_f32);
    let recorder: Arc<dyn Recorder> =
        Arc::new(FixedRecorder { level_tx, scratch: tempfile::tempdir().unwrap() });
    let output = Arc::new(MemoryOutput::default());
    let permissions = PermissionGate::start(Arc::new(AlwaysGrantedProbe));
    let config = AppConfig::new_default();
    let view_model = OverlayViewModel::new(config.overlay.clone());
    let coordinator = SessionCoordinator::new(recorder, output.clone(), permissions, view_model);

    let device = AudioDevice::default_sentinel();
    coordinator.handle_intent(Intent::StartOrStop, config.clone(), device.clone()).await;
    coordinator.handle_intent(Intent::Cancel, config, device).await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(output.emitted.lock().unwrap().is_empty());
}
