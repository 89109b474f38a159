//! The Session Coordinator (C8): the state machine described in the data model.
//!
//! Grounded directly in the teacher's `justwhisper-tauri/src-tauri/src/session_controller.rs`:
//! an `Inner` struct behind `Arc<Mutex<Inner>>`, a monotonic `session_id` bumped on every
//! transition that starts new async work, and a `still_current(session_id)` guard checked
//! immediately before every side effect. The processing task follows
//! `justwhisper-engine/src/engine.rs`'s old `run_session_with_hook` shape: build the result
//! incrementally so a partial transcript is never lost to a downstream failure.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use justwhisper_core::{
    clean, enhancement_system_prompt, strip_enhancement_quotes, AppConfig, AudioDevice, Intent,
    LogEntry, LogRing, OutputMode,
};
use justwhisper_providers::{build_chat_provider, transcribe, SpeechClientError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::permission::PermissionGate;
use crate::traits::{CapturedRecording, OutputError, OutputSink, Recorder, RecorderError};
use crate::view_model::{MessageKind, OverlayViewModel};

/// §4.8 transition table hide delays.
const CANCEL_HIDE_DELAY: Duration = Duration::from_millis(500);
const PASTE_CONFIRM_DELAY: Duration = Duration::from_millis(500);
const COPY_ONLY_HIDE_DELAY: Duration = Duration::from_millis(1_500);
const FAILURE_HIDE_DELAY: Duration = Duration::from_secs(10);

/// §3 `SessionState`, minus `Idle` — the Overlay View Model's `setIdle` is the UI-facing name
/// for the same thing this machine calls `Hidden`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Hidden,
    Recording { level: f32 },
    Thinking { mode: OutputMode },
    ShowingMessage { kind: MessageKind, text: String },
}

struct Inner {
    state: SessionState,
    session_id: u64,
    processing_task: Option<JoinHandle<()>>,
    hide_task: Option<JoinHandle<()>>,
    log: LogRing,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: SessionState::Hidden,
            session_id: 0,
            processing_task: None,
            hide_task: None,
            log: LogRing::new(),
        }
    }
}

#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Mutex<Inner>>,
    recorder: Arc<dyn Recorder>,
    output: Arc<dyn OutputSink>,
    permissions: Arc<PermissionGate>,
    view_model: OverlayViewModel,
}

impl SessionCoordinator {
    pub fn new(
        recorder: Arc<dyn Recorder>,
        output: Arc<dyn OutputSink>,
        permissions: Arc<PermissionGate>,
        view_model: OverlayViewModel,
    ) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner::default())), recorder, output, permissions, view_model }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn log_snapshot(&self) -> Vec<LogEntry> {
        self.inner.lock().await.log.snapshot()
    }

    pub fn view_model(&self) -> &OverlayViewModel {
        &self.view_model
    }

    /// Entry point for intents delivered by the Hotkey Controller (C5).
    pub async fn handle_intent(&self, intent: Intent, config: AppConfig, device: AudioDevice) {
        match intent {
            Intent::StartOrStop => self.start_or_stop(config, device).await,
            Intent::StopCopyOnly => self.stop_copy_only(config).await,
            Intent::Cancel => self.cancel().await,
        }
    }

    async fn start_or_stop(&self, config: AppConfig, device: AudioDevice) {
        let state = { self.inner.lock().await.state.clone() };
        match state {
            SessionState::Hidden => self.begin_recording(config, device).await,
            SessionState::Recording { .. } => self.stop_recording(config, OutputMode::Paste).await,
            SessionState::ShowingMessage { .. } => {
                self.cancel_hide_timer().await;
                self.begin_recording(config, device).await;
            }
            SessionState::Thinking { .. } => {}
        }
    }

    async fn stop_copy_only(&self, config: AppConfig) {
        let state = { self.inner.lock().await.state.clone() };
        if matches!(state, SessionState::Recording { .. }) {
            self.stop_recording(config, OutputMode::CopyOnly).await;
        }
    }

    async fn cancel(&self) {
        let (session_id, state, task) = {
            let mut inner = self.inner.lock().await;
            let state = inner.state.clone();
            let task = inner.processing_task.take();
            inner.session_id = inner.session_id.wrapping_add(1);
            (inner.session_id, state, task)
        };

        match state {
            SessionState::Recording { .. } => {
                if let Err(e) = self.recorder.stop().await {
                    log::warn!("recorder stop on cancel failed: {e}");
                }
                self.transition_to_message(
                    session_id,
                    MessageKind::Error,
                    "Recording canceled".into(),
                    CANCEL_HIDE_DELAY,
                )
                .await;
            }
            SessionState::Thinking { .. } => {
                if let Some(task) = task {
                    task.abort();
                }
                self.transition_to_message(
                    session_id,
                    MessageKind::Error,
                    "Transcription canceled".into(),
                    CANCEL_HIDE_DELAY,
                )
                .await;
            }
            SessionState::Hidden | SessionState::ShowingMessage { .. } => {}
        }
    }

    /// §4.8 overlay-appearance-reapply rule runs here, on every `Hidden -> Recording` edge.
    async fn begin_recording(&self, config: AppConfig, device: AudioDevice) {
        if !self.permissions.microphone_granted() {
            let session_id = self.bump_session_id().await;
            self.transition_to_message(
                session_id,
                MessageKind::Error,
                recorder_error_message(&RecorderError::PermissionDenied),
                FAILURE_HIDE_DELAY,
            )
            .await;
            return;
        }

        self.cancel_hide_timer().await;
        self.view_model.apply_appearance(config.overlay);

        if let Err(e) = self.recorder.start(&device).await {
            let session_id = self.bump_session_id().await;
            self.transition_to_message(session_id, MessageKind::Error, recorder_error_message(&e), FAILURE_HIDE_DELAY)
                .await;
            return;
        }

        let session_id = {
            let mut inner = self.inner.lock().await;
            inner.session_id = inner.session_id.wrapping_add(1);
            inner.state = SessionState::Recording { level: 0.0 };
            inner.session_id
        };
        self.view_model.set_recording(0.0);
        self.spawn_level_relay(session_id);
    }

    /// §4.4: a hot-unplug notification that removes the currently-selected device forces
    /// `setDevice(Default)` and, if recording, restarts capture automatically. A no-op outside
    /// `Recording` — the registry's own fallback-to-`Default` handles the idle case.
    pub async fn device_disconnected(&self, config: AppConfig) {
        let recording = matches!(self.inner.lock().await.state, SessionState::Recording { .. });
        if !recording {
            return;
        }

        if let Err(e) = self.recorder.stop().await {
            log::warn!("recorder stop on device disconnect failed: {e}");
        }

        let default_device = AudioDevice::default_sentinel();
        if let Err(e) = self.recorder.start(&default_device).await {
            let session_id = self.bump_session_id().await;
            self.transition_to_message(session_id, MessageKind::Error, recorder_error_message(&e), FAILURE_HIDE_DELAY)
                .await;
            return;
        }

        let session_id = {
            let mut inner = self.inner.lock().await;
            inner.session_id = inner.session_id.wrapping_add(1);
            inner.state = SessionState::Recording { level: 0.0 };
            inner.session_id
        };
        self.view_model.apply_appearance(config.overlay);
        self.view_model.set_recording(0.0);
        self.spawn_level_relay(session_id);
    }

    fn spawn_level_relay(&self, session_id: u64) {
        let mut level_rx = self.recorder.subscribe_level();
        let coordinator = self.clone();
        tokio::spawn(async move {
            while level_rx.changed().await.is_ok() {
                if !coordinator.still_current(session_id).await {
                    return;
                }
                let level = *level_rx.borrow();
                let still_recording = matches!(coordinator.inner.lock().await.state, SessionState::Recording { .. });
                if !still_recording {
                    return;
                }
                coordinator.view_model.set_recording(level);
            }
        });
    }

    async fn stop_recording(&self, config: AppConfig, mode: OutputMode) {
        let captured = match self.recorder.stop().await {
            Ok(c) => c,
            Err(e) => {
                let session_id = self.bump_session_id().await;
                self.transition_to_message(session_id, MessageKind::Error, recorder_error_message(&e), FAILURE_HIDE_DELAY)
                    .await;
                return;
            }
        };

        let session_id = {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Thinking { mode };
            inner.session_id
        };
        self.view_model.set_thinking();

        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            coordinator.run_processing(session_id, captured, config, mode).await;
        });

        let mut inner = self.inner.lock().await;
        if inner.session_id == session_id {
            inner.processing_task = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// The `Thinking` body (§4.8): read the file, transcribe, enhance-or-clean, hand to Output.
    async fn run_processing(&self, session_id: u64, captured: CapturedRecording, config: AppConfig, mode: OutputMode) {
        if !self.still_current(session_id).await {
            return;
        }

        let samples = match read_raw_f32_file(&captured.path) {
            Ok(s) => s,
            Err(e) => {
                self.finish_processing_with_error(session_id, format!("could not read recording: {e}")).await;
                return;
            }
        };

        if !self.still_current(session_id).await {
            return;
        }

        let mut captured_logs: Vec<LogEntry> = Vec::new();
        let text_result = transcribe(&samples, captured.sample_rate_hz, &config.speech_provider, &mut |e| {
            captured_logs.push(e)
        })
        .await;

        {
            let mut inner = self.inner.lock().await;
            for entry in captured_logs {
                inner.log.push(entry);
            }
        }

        if !self.still_current(session_id).await {
            return;
        }

        let transcript = match text_result {
            Ok(t) => t,
            Err(e) => {
                self.finish_processing_with_error(session_id, speech_error_message(&e)).await;
                return;
            }
        };

        let cleaned = self.enhance_or_clean(&transcript, &config).await;

        if !self.still_current(session_id).await {
            return;
        }

        if cleaned.trim().is_empty() {
            self.finish_processing_with_error(session_id, "No speech detected".into()).await;
            return;
        }

        if let Err(e) = self.output.emit(&cleaned, mode).await {
            self.finish_processing_with_error(session_id, output_error_message(&e)).await;
            return;
        }

        if !self.still_current(session_id).await {
            return;
        }

        match mode {
            OutputMode::Paste => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.state = SessionState::Hidden;
                    inner.processing_task = None;
                }
                self.schedule_hide(session_id, PASTE_CONFIRM_DELAY).await;
            }
            OutputMode::CopyOnly => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.processing_task = None;
                }
                self.transition_to_message(
                    session_id,
                    MessageKind::Success,
                    "Copied to clipboard".into(),
                    COPY_ONLY_HIDE_DELAY,
                )
                .await;
            }
        }
    }

    /// §4.6 step before Output: LLM enhancement if configured and usable, falling back to the
    /// deterministic cleaner on any failure — never a hard error past this point.
    async fn enhance_or_clean(&self, transcript: &str, config: &AppConfig) -> String {
        if !config.use_llm_enhancement {
            return clean(transcript, &config.cleaner, &config.word_replacements);
        }

        match build_chat_provider(&config.chat_provider) {
            Ok(provider) => match provider.complete(enhancement_system_prompt(), transcript).await {
                Ok(out) => strip_enhancement_quotes(&out),
                Err(e) => {
                    log::warn!("llm enhancement failed, falling back to deterministic cleaner: {e}");
                    clean(transcript, &config.cleaner, &config.word_replacements)
                }
            },
            Err(e) => {
                log::warn!("chat provider unusable, falling back to deterministic cleaner: {e}");
                clean(transcript, &config.cleaner, &config.word_replacements)
            }
        }
    }

    async fn finish_processing_with_error(&self, session_id: u64, message: String) {
        {
            let mut inner = self.inner.lock().await;
            inner.processing_task = None;
        }
        self.transition_to_message(session_id, MessageKind::Error, message, FAILURE_HIDE_DELAY).await;
    }

    async fn transition_to_message(&self, session_id: u64, kind: MessageKind, text: String, hide_delay: Duration) {
        if !self.still_current(session_id).await {
            return;
        }
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::ShowingMessage { kind, text: text.clone() };
        }
        self.view_model.set_message(kind, text);
        self.schedule_hide(session_id, hide_delay).await;
    }

    /// Drives `ShowingMessage -> Hidden` on timer expiry (§4.8), and the brief post-paste
    /// confirmation window before the overlay clears back to idle.
    async fn schedule_hide(&self, session_id: u64, delay: Duration) {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !coordinator.still_current(session_id).await {
                return;
            }
            {
                let mut inner = coordinator.inner.lock().await;
                if matches!(inner.state, SessionState::ShowingMessage { .. }) {
                    inner.state = SessionState::Hidden;
                }
            }
            coordinator.view_model.set_idle();
        });

        let mut inner = self.inner.lock().await;
        if let Some(prev) = inner.hide_task.replace(handle) {
            prev.abort();
        }
    }

    async fn cancel_hide_timer(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.hide_task.take() {
            task.abort();
        }
    }

    async fn bump_session_id(&self) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.session_id = inner.session_id.wrapping_add(1);
        inner.session_id
    }

    async fn still_current(&self, session_id: u64) -> bool {
        self.inner.lock().await.session_id == session_id
    }
}

fn read_raw_f32_file(path: &Path) -> std::io::Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn recorder_error_message(e: &RecorderError) -> String {
    match e {
        RecorderError::PermissionDenied => "Microphone permission required".into(),
        RecorderError::DeviceUnavailable => "Selected microphone is unavailable".into(),
        RecorderError::IoFailure(msg) => format!("Recording failed: {msg}"),
    }
}

fn speech_error_message(e: &SpeechClientError) -> String {
    match e {
        SpeechClientError::MissingCredential => "Speech provider is not configured".into(),
        SpeechClientError::InvalidEndpoint(url) => format!("Invalid speech endpoint: {url}"),
        SpeechClientError::Http { status, .. } => format!("Speech request failed ({status})"),
        SpeechClientError::Io(msg) => format!("Speech request failed: {msg}"),
        SpeechClientError::AudioConversion(msg) => format!("Could not prepare audio: {msg}"),
        SpeechClientError::ResponseParse(msg) => format!("Could not parse transcription: {msg}"),
    }
}

fn output_error_message(e: &OutputError) -> String {
    match e {
        OutputError::Clipboard(msg) => format!("Clipboard error: {msg}"),
        OutputError::Paste(msg) => format!("Paste failed: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use justwhisper_core::{AudioDevice, SpeechProviderConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::watch as tokio_watch;

    struct FakeProbe;
    #[async_trait]
    impl crate::permission::PermissionProbe for FakeProbe {
        fn status(&self, _permission: crate::permission::Permission) -> crate::permission::PermissionStatus {
            crate::permission::PermissionStatus::Granted
        }
        async fn request(&self, _permission: crate::permission::Permission) {}
    }

    struct FakeRecorder {
        level_tx: tokio_watch::Sender<f32>,
        start_calls: AtomicU32,
        fail_start: bool,
    }

    #[async_trait]
    impl Recorder for FakeRecorder {
        async fn start(&self, _device: &AudioDevice) -> Result<(), RecorderError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(RecorderError::DeviceUnavailable);
            }
            Ok(())
        }

        async fn stop(&self) -> Result<CapturedRecording, RecorderError> {
            Ok(CapturedRecording { path: std::env::temp_dir().join("empty-recording.raw"), sample_rate_hz: 44_100 })
        }

        fn subscribe_level(&self) -> tokio_watch::Receiver<f32> {
            self.level_tx.subscribe()
        }
    }

    struct FakeOutput {
        calls: StdMutex<Vec<(String, OutputMode)>>,
    }

    #[async_trait]
    impl OutputSink for FakeOutput {
        async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
            self.calls.lock().unwrap().push((text.to_string(), mode));
            Ok(())
        }
    }

    fn config_with_empty_speech_provider() -> AppConfig {
        let mut cfg = AppConfig::new_default();
        cfg.speech_provider = SpeechProviderConfig::OpenAiWhisper {
            api_key: String::new(),
            model: "whisper-1".into(),
            base_url: "https://api.openai.com/v1".into(),
        };
        cfg
    }

    fn make_coordinator(fail_start: bool) -> (SessionCoordinator, Arc<FakeOutput>) {
        let (level_tx, _) = tokio_watch::channel(0.0);
        let recorder = Arc::new(FakeRecorder { level_tx, start_calls: AtomicU32::new(0), fail_start });
        let output = Arc::new(FakeOutput { calls: StdMutex::new(Vec::new()) });
        let permissions = PermissionGate::start(Arc::new(FakeProbe));
        let view_model = OverlayViewModel::new(Default::default());
        let coordinator = SessionCoordinator::new(recorder, output.clone(), permissions, view_model);
        (coordinator, output)
    }

    #[tokio::test]
    async fn start_or_stop_from_hidden_begins_recording() {
        let (coordinator, _output) = make_coordinator(false);
        coordinator
            .handle_intent(Intent::StartOrStop, AppConfig::new_default(), AudioDevice::default_sentinel())
            .await;
        assert!(matches!(coordinator.state().await, SessionState::Recording { .. }));
    }

    #[tokio::test]
    async fn recorder_failure_surfaces_as_showing_message() {
        let (coordinator, _output) = make_coordinator(true);
        coordinator
            .handle_intent(Intent::StartOrStop, AppConfig::new_default(), AudioDevice::default_sentinel())
            .await;
        assert!(matches!(coordinator.state().await, SessionState::ShowingMessage { kind: MessageKind::Error, .. }));
    }

    #[tokio::test]
    async fn cancel_while_recording_shows_canceled_message() {
        let (coordinator, _output) = make_coordinator(false);
        coordinator
            .handle_intent(Intent::StartOrStop, AppConfig::new_default(), AudioDevice::default_sentinel())
            .await;
        coordinator.handle_intent(Intent::Cancel, AppConfig::new_default(), AudioDevice::default_sentinel()).await;
        match coordinator.state().await {
            SessionState::ShowingMessage { kind, text } => {
                assert_eq!(kind, MessageKind::Error);
                assert_eq!(text, "Recording canceled");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_recording_with_unusable_speech_provider_fails_gracefully() {
        let (coordinator, output) = make_coordinator(false);
        let device = AudioDevice::default_sentinel();
        coordinator.handle_intent(Intent::StartOrStop, config_with_empty_speech_provider(), device.clone()).await;
        coordinator.handle_intent(Intent::StartOrStop, config_with_empty_speech_provider(), device).await;

        // Processing happens on a spawned task; give it a moment to run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(output.calls.lock().unwrap().is_empty());
        assert!(matches!(coordinator.state().await, SessionState::ShowingMessage { kind: MessageKind::Error, .. }));
    }

    /// S4: device disappears mid-record. `device_disconnected` must restart capture against
    /// `Default` without dropping out of `Recording`.
    #[tokio::test]
    async fn device_disconnected_restarts_recording_against_default() {
        let (coordinator, _output) = make_coordinator(false);
        coordinator
            .handle_intent(Intent::StartOrStop, AppConfig::new_default(), AudioDevice::default_sentinel())
            .await;
        assert!(matches!(coordinator.state().await, SessionState::Recording { .. }));

        coordinator.device_disconnected(AppConfig::new_default()).await;

        assert!(matches!(coordinator.state().await, SessionState::Recording { .. }));
    }

    #[tokio::test]
    async fn device_disconnected_is_a_no_op_outside_recording() {
        let (coordinator, _output) = make_coordinator(false);
        coordinator.device_disconnected(AppConfig::new_default()).await;
        assert!(matches!(coordinator.state().await, SessionState::Hidden));
    }
}
