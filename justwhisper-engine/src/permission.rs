//! The Permission Gate (C2): tracks microphone and input-monitoring grant status and polls for
//! external changes (the user flipping a toggle in the OS privacy panel) every 2s.
//!
//! The OS-specific probing and prompting is injected via `PermissionProbe`, implemented by
//! `justwhisper-platform`; this module owns only the cross-platform caching/polling logic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Microphone,
    InputMonitoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Platform-specific permission queries and prompts.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    fn status(&self, permission: Permission) -> PermissionStatus;

    /// Idempotent: issues the OS prompt if undetermined, otherwise deep-links to the privacy panel.
    async fn request(&self, permission: Permission);
}

/// Owns the polling loop and the cached status the rest of the app reads synchronously.
pub struct PermissionGate {
    probe: Arc<dyn PermissionProbe>,
    microphone_tx: watch::Sender<bool>,
    input_monitoring_tx: watch::Sender<bool>,
}

impl PermissionGate {
    pub fn start(probe: Arc<dyn PermissionProbe>) -> Arc<Self> {
        let mic_granted = probe.status(Permission::Microphone) == PermissionStatus::Granted;
        let im_granted = probe.status(Permission::InputMonitoring) == PermissionStatus::Granted;
        let (microphone_tx, _) = watch::channel(mic_granted);
        let (input_monitoring_tx, _) = watch::channel(im_granted);

        let gate = Arc::new(Self { probe, microphone_tx, input_monitoring_tx });
        gate.clone().spawn_poll_loop();
        gate
    }

    fn spawn_poll_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let mic_granted = *self.microphone_tx.borrow();
                let im_granted = *self.input_monitoring_tx.borrow();
                if mic_granted && im_granted {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;

                let mic_now = self.probe.status(Permission::Microphone) == PermissionStatus::Granted;
                if mic_now != mic_granted {
                    let _ = self.microphone_tx.send(mic_now);
                }

                let im_now = self.probe.status(Permission::InputMonitoring) == PermissionStatus::Granted;
                if im_now != im_granted {
                    let _ = self.input_monitoring_tx.send(im_now);
                }
            }
        });
    }

    /// Never blocks: reads the last polled/pushed status.
    pub fn microphone_granted(&self) -> bool {
        *self.microphone_tx.borrow()
    }

    pub fn input_monitoring_granted(&self) -> bool {
        *self.input_monitoring_tx.borrow()
    }

    pub fn subscribe_microphone(&self) -> watch::Receiver<bool> {
        self.microphone_tx.subscribe()
    }

    pub fn subscribe_input_monitoring(&self) -> watch::Receiver<bool> {
        self.input_monitoring_tx.subscribe()
    }

    pub async fn request(&self, permission: Permission) {
        self.probe.request(permission).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeProbe {
        mic: AtomicBool,
        input_monitoring: AtomicBool,
    }

    #[async_trait]
    impl PermissionProbe for FakeProbe {
        fn status(&self, permission: Permission) -> PermissionStatus {
            let granted = match permission {
                Permission::Microphone => self.mic.load(Ordering::SeqCst),
                Permission::InputMonitoring => self.input_monitoring.load(Ordering::SeqCst),
            };
            if granted { PermissionStatus::Granted } else { PermissionStatus::Undetermined }
        }

        async fn request(&self, permission: Permission) {
            match permission {
                Permission::Microphone => self.mic.store(true, Ordering::SeqCst),
                Permission::InputMonitoring => self.input_monitoring.store(true, Ordering::SeqCst),
            }
        }
    }

    #[tokio::test]
    async fn reflects_initial_probe_status() {
        let probe = Arc::new(FakeProbe { mic: AtomicBool::new(true), input_monitoring: AtomicBool::new(false) });
        let gate = PermissionGate::start(probe);
        assert!(gate.microphone_granted());
        assert!(!gate.input_monitoring_granted());
    }

    #[tokio::test]
    async fn request_delegates_to_probe() {
        let probe = Arc::new(FakeProbe { mic: AtomicBool::new(false), input_monitoring: AtomicBool::new(false) });
        let gate = PermissionGate::start(probe);
        gate.request(Permission::Microphone).await;
        assert_eq!(gate.probe.status(Permission::Microphone), PermissionStatus::Granted);
    }
}
