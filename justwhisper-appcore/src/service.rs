//! `AppService`: the facade that wires the Config Store (C1), Device Registry (C3), Permission
//! Gate (C2), and Session Coordinator (C8) into one handle for the Tauri shell and the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use justwhisper_audio::DeviceRegistry;
use justwhisper_core::{AppConfig, AudioDevice, DeviceUid, Intent, LogEntry};
use justwhisper_engine::permission::{PermissionGate, PermissionProbe};
use justwhisper_engine::traits::{OutputSink, Recorder};
use justwhisper_engine::{OverlayState, OverlayViewModel, SessionCoordinator, SessionState};
use justwhisper_runtime::ConfigStore;
use tokio::sync::watch;

#[cfg(any(windows, target_os = "macos"))]
use crate::recorder_adapter;

#[derive(Clone)]
pub struct AppService {
    config: Arc<ConfigStore>,
    devices: Arc<DeviceRegistry>,
    permissions: Arc<PermissionGate>,
    coordinator: SessionCoordinator,
}

impl AppService {
    pub fn new(
        config_path: PathBuf,
        recorder: Arc<dyn Recorder>,
        output: Arc<dyn OutputSink>,
        permission_probe: Arc<dyn PermissionProbe>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(ConfigStore::open(config_path)?);
        let initial = config.current();

        let devices = Arc::new(DeviceRegistry::start(
            initial.selected_device_uid.clone(),
        ));
        let permissions = PermissionGate::start(permission_probe);
        let view_model = OverlayViewModel::new(initial.overlay);

        let coordinator = SessionCoordinator::new(recorder, output, permissions.clone(), view_model);

        let service = Self { config, devices, permissions, coordinator };
        service.spawn_device_disconnect_watcher();
        Ok(service)
    }

    /// §4.4: a hot-unplug notification that removes the currently-selected device forces
    /// `setDevice(Default)` and, if recording, restarts capture automatically.
    fn spawn_device_disconnect_watcher(&self) {
        let config = self.config.clone();
        let devices = self.devices.clone();
        let coordinator = self.coordinator.clone();
        let mut devices_rx = self.devices.subscribe();

        tokio::spawn(async move {
            loop {
                let current = devices_rx.borrow_and_update().clone();
                let selected = devices.selected();
                let still_present = selected.as_str() == justwhisper_core::DEFAULT_DEVICE_UID
                    || current.iter().any(|d| d.uid == selected);

                if !still_present {
                    devices.select(DeviceUid::new(justwhisper_core::DEFAULT_DEVICE_UID));
                    coordinator.device_disconnected(config.current()).await;
                }

                if devices_rx.changed().await.is_err() {
                    return;
                }
            }
        });
    }

    /// Builds the recorder from the real `justwhisper-audio` capture graph instead of a test
    /// double; `scratch_dir` holds the raw-PCM scratch files written during recording.
    #[cfg(any(windows, target_os = "macos"))]
    pub fn with_platform_recorder(
        config_path: PathBuf,
        scratch_dir: PathBuf,
        output: Arc<dyn OutputSink>,
        permission_probe: Arc<dyn PermissionProbe>,
    ) -> anyhow::Result<Self> {
        let recorder = recorder_adapter::boxed(scratch_dir);
        Self::new(config_path, recorder, output, permission_probe)
    }

    pub fn config(&self) -> AppConfig {
        self.config.current()
    }

    pub fn save_config(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        self.config.save(cfg)
    }

    pub fn subscribe_config(&self) -> watch::Receiver<AppConfig> {
        self.config.subscribe()
    }

    pub fn devices(&self) -> Vec<AudioDevice> {
        self.devices.current()
    }

    pub fn select_device(&self, uid: DeviceUid) -> DeviceUid {
        self.devices.select(uid)
    }

    pub fn subscribe_devices(&self) -> watch::Receiver<Vec<AudioDevice>> {
        self.devices.subscribe()
    }

    pub fn permissions(&self) -> &Arc<PermissionGate> {
        &self.permissions
    }

    pub async fn overlay_state(&self) -> SessionState {
        self.coordinator.state().await
    }

    /// The coordinator owns the `OverlayViewModel`; this mirrors its state channel so the Tauri
    /// shell can `window.emit` on every transition without polling.
    pub fn subscribe_overlay(&self) -> watch::Receiver<OverlayState> {
        self.coordinator.view_model().subscribe_state()
    }

    /// §4.8's overlay-appearance-reapply rule pushes a fresh snapshot here on every
    /// `Hidden -> Recording` transition, so the shell never has to poll C1 for it.
    pub fn subscribe_appearance(&self) -> watch::Receiver<justwhisper_core::OverlayAppearance> {
        self.coordinator.view_model().subscribe_appearance()
    }

    pub async fn log_snapshot(&self) -> Vec<LogEntry> {
        self.coordinator.log_snapshot().await
    }

    /// Entry point for intents delivered by the Hotkey Controller (C5).
    pub async fn handle_intent(&self, intent: Intent) {
        let config = self.config.current();
        let device = self.devices.resolve(&self.devices.selected());
        self.coordinator.handle_intent(intent, config, device).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use justwhisper_core::OutputMode;
    use justwhisper_engine::permission::{Permission, PermissionStatus};
    use justwhisper_engine::traits::{CapturedRecording, OutputError, RecorderError};
    use std::sync::Mutex;

    struct FakeRecorder {
        level_tx: watch::Sender<f32>,
        scratch: tempfile::TempDir,
    }

    #[async_trait]
    impl Recorder for FakeRecorder {
        async fn start(&self, _device: &AudioDevice) -> Result<(), RecorderError> {
            Ok(())
        }
        async fn stop(&self) -> Result<CapturedRecording, RecorderError> {
            let path = self.scratch.path().join("capture.raw");
            std::fs::write(&path, []).unwrap();
            Ok(CapturedRecording { path, sample_rate_hz: 16_000 })
        }
        fn subscribe_level(&self) -> watch::Receiver<f32> {
            self.level_tx.subscribe()
        }
    }

    #[derive(Default)]
    struct FakeOutput {
        emitted: Mutex<Vec<(String, OutputMode)>>,
    }

    #[async_trait]
    impl OutputSink for FakeOutput {
        async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
            self.emitted.lock().unwrap().push((text.to_string(), mode));
            Ok(())
        }
    }

    struct AlwaysGrantedProbe;

    #[async_trait]
    impl PermissionProbe for AlwaysGrantedProbe {
        fn status(&self, _permission: Permission) -> PermissionStatus {
            PermissionStatus::Granted
        }
        async fn request(&self, _permission: Permission) {}
    }

    #[tokio::test]
    async fn config_round_trips_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let (level_tx, _) = watch::channel(0.0_f32);
        let recorder: Arc<dyn Recorder> =
            Arc::new(FakeRecorder { level_tx, scratch: tempfile::tempdir().unwrap() });
        let output: Arc<dyn OutputSink> = Arc::new(FakeOutput::default());
        let probe: Arc<dyn PermissionProbe> = Arc::new(AlwaysGrantedProbe);

        let svc = AppService::new(dir.path().join("config.json"), recorder, output, probe).unwrap();

        let mut cfg = svc.config();
        cfg.use_llm_enhancement = true;
        svc.save_config(&cfg).unwrap();
        assert!(svc.config().use_llm_enhancement);
    }

    #[tokio::test]
    async fn start_or_stop_begins_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (level_tx, _) = watch::channel(0.0_f32);
        let recorder: Arc<dyn Recorder> =
            Arc::new(FakeRecorder { level_tx, scratch: tempfile::tempdir().unwrap() });
        let output: Arc<dyn OutputSink> = Arc::new(FakeOutput::default());
        let probe: Arc<dyn PermissionProbe> = Arc::new(AlwaysGrantedProbe);

        let svc = AppService::new(dir.path().join("config.json"), recorder, output, probe).unwrap();

        svc.handle_intent(Intent::StartOrStop).await;
        assert!(matches!(svc.overlay_state().await, SessionState::Recording { .. }));
    }
}
