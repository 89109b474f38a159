//! Thin Tauri-event adapter over the Session Coordinator (C8), reached through `AppService`.
//!
//! Bridges the `tokio::sync::watch` channels `AppService` already exposes (overlay state,
//! overlay appearance, device list) to `app.emit`, and drains intents produced by the platform
//! hotkey controller into `AppService::handle_intent`. Mirrors the teacher's
//! `emit_status`/`emit_mic_level` dual-emission helpers, generalized over the DTO boundary in
//! `justwhisper_runtime::ipc`.

use std::sync::Arc;

use justwhisper_appcore::AppService;
use justwhisper_core::Intent;
use justwhisper_runtime::ipc::OverlaySnapshot;
use tauri::{AppHandle, Emitter};
use tokio::sync::mpsc;

pub const EVENT_OVERLAY_STATE: &str = "justwhisper://overlay_state";
pub const EVENT_DEVICES_CHANGED: &str = "justwhisper://devices_changed";

/// Spawns the background relays that keep the webviews in sync with `service`, and the task
/// draining `intent_rx` (produced by the platform hotkey controller) into the coordinator.
pub fn spawn(app: AppHandle, service: Arc<AppService>, mut intent_rx: mpsc::Receiver<Intent>) {
    tokio::spawn(relay_overlay_state(app.clone(), service.clone()));
    tokio::spawn(relay_devices(app, service.clone()));

    tokio::spawn(async move {
        while let Some(intent) = intent_rx.recv().await {
            service.handle_intent(intent).await;
        }
    });
}

async fn relay_overlay_state(app: AppHandle, service: Arc<AppService>) {
    let mut rx = service.subscribe_overlay();
    loop {
        let snapshot = OverlaySnapshot::from(rx.borrow_and_update().clone());
        let _ = app.emit(EVENT_OVERLAY_STATE, snapshot);
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn relay_devices(app: AppHandle, service: Arc<AppService>) {
    let mut rx = service.subscribe_devices();
    loop {
        let devices = rx.borrow_and_update().clone();
        let _ = app.emit(EVENT_DEVICES_CHANGED, devices);
        if rx.changed().await.is_err() {
            return;
        }
    }
}
