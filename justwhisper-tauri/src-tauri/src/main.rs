#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::Arc;

// Tracks whether the user is currently dragging the overlay. We only persist overlay
// move events while this flag is set to avoid persisting on normal clicks or programmatic moves.
static OVERLAY_IS_DRAGGING: std::sync::OnceLock<std::sync::atomic::AtomicBool> =
    std::sync::OnceLock::new();

use tauri::menu::{MenuBuilder, MenuItemBuilder};
use tauri::tray::TrayIconBuilder;
use tauri::{Emitter, Manager, State, WebviewUrl, WebviewWindowBuilder};
use tauri_plugin_store::StoreExt;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct OverlayMovedPayload {
    x: i32,
    y: i32,
}

#[cfg(any(windows, target_os = "macos"))]
use tauri_plugin_global_shortcut::GlobalShortcutExt;

#[cfg(windows)]
use window_vibrancy::{apply_acrylic, apply_tabbed};

#[cfg(target_os = "linux")]
fn load_tray_icon(app: &tauri::AppHandle) -> Option<tauri::image::Image<'static>> {
    let path = app
        .path()
        .resolve("icons/32x32.png", tauri::path::BaseDirectory::Resource)
        .ok()?;

    tauri::image::Image::from_path(path)
        .ok()
        .map(|i| i.to_owned())
}

#[cfg(not(target_os = "linux"))]
fn load_tray_icon(_app: &tauri::AppHandle) -> Option<tauri::image::Image<'static>> {
    None
}

use justwhisper_appcore::AppService;
use justwhisper_core::{AppConfig, DeviceUid};
use justwhisper_runtime::ipc::LogEntryDto;

mod session_controller;

const OVERLAY_BOTTOM_OFFSET: i32 = 80;

const OVERLAY_POSITION_STORE_PATH: &str = "ui_state.json";
const OVERLAY_POSITION_STORE_KEY: &str = "overlay_position";

#[cfg(any(windows, target_os = "macos"))]
const HOTKEY_STORE_KEY: &str = "toggle_hotkey";

#[cfg(windows)]
const DEFAULT_TOGGLE_HOTKEY: &str = "Ctrl+Space";

#[cfg(target_os = "macos")]
const DEFAULT_TOGGLE_HOTKEY: &str = "Alt+Z";

pub const EVENT_TOGGLE_HOTKEY_CHANGED: &str = "justwhisper://toggle_hotkey_changed";

struct AppState {
    service: Arc<AppService>,

    #[cfg(any(windows, target_os = "macos"))]
    toggle_hotkey: std::sync::Mutex<String>,
}

fn default_config_path(app: &tauri::AppHandle) -> anyhow::Result<PathBuf> {
    let dir = app.path().app_data_dir()?;
    Ok(dir.join("config.json"))
}

fn default_scratch_dir(app: &tauri::AppHandle) -> anyhow::Result<PathBuf> {
    let dir = app.path().app_data_dir()?;
    Ok(dir.join("capture"))
}

#[cfg(target_os = "macos")]
fn build_service(app: &tauri::AppHandle) -> anyhow::Result<Arc<AppService>> {
    let config_path = default_config_path(app)?;
    let scratch_dir = default_scratch_dir(app)?;
    let output = Arc::new(justwhisper_platform::MacosOutputSink::default());
    let probe = Arc::new(justwhisper_platform::MacosPermissionProbe);
    Ok(Arc::new(AppService::with_platform_recorder(config_path, scratch_dir, output, probe)?))
}

#[cfg(windows)]
fn build_service(app: &tauri::AppHandle) -> anyhow::Result<Arc<AppService>> {
    let config_path = default_config_path(app)?;
    let scratch_dir = default_scratch_dir(app)?;
    let output = Arc::new(justwhisper_platform::WindowsOutputSink::default());
    let probe = Arc::new(justwhisper_platform::WindowsPermissionProbe);
    Ok(Arc::new(AppService::with_platform_recorder(config_path, scratch_dir, output, probe)?))
}

#[tauri::command]
async fn get_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.service.config())
}

#[tauri::command]
async fn set_config(state: State<'_, AppState>, cfg: AppConfig) -> Result<(), String> {
    state.service.save_config(&cfg).map_err(|e| e.to_string())
}

#[tauri::command]
async fn list_devices(state: State<'_, AppState>) -> Result<Vec<justwhisper_core::AudioDevice>, String> {
    Ok(state.service.devices())
}

#[tauri::command]
async fn select_device(state: State<'_, AppState>, uid: String) -> Result<(), String> {
    state.service.select_device(DeviceUid::new(uid));
    Ok(())
}

#[tauri::command]
async fn toggle_recording(state: State<'_, AppState>) -> Result<(), String> {
    state.service.handle_intent(justwhisper_core::Intent::StartOrStop).await;
    Ok(())
}

#[tauri::command]
async fn stop_copy_only(state: State<'_, AppState>) -> Result<(), String> {
    state.service.handle_intent(justwhisper_core::Intent::StopCopyOnly).await;
    Ok(())
}

#[tauri::command]
async fn cancel_recording(state: State<'_, AppState>) -> Result<(), String> {
    state.service.handle_intent(justwhisper_core::Intent::Cancel).await;
    Ok(())
}

#[tauri::command]
async fn get_log_snapshot(state: State<'_, AppState>) -> Result<Vec<LogEntryDto>, String> {
    Ok(justwhisper_runtime::ipc::log_snapshot_dto(state.service.log_snapshot().await))
}

#[derive(serde::Serialize)]
struct ForegroundAppInfo {
    name: Option<String>,
}

#[tauri::command]
async fn capture_foreground_app() -> Result<ForegroundAppInfo, String> {
    #[cfg(any(windows, target_os = "macos"))]
    let name = justwhisper_platform::foreground_app_label();
    #[cfg(not(any(windows, target_os = "macos")))]
    let name: Option<String> = None;

    Ok(ForegroundAppInfo { name })
}

#[cfg(any(windows, target_os = "macos"))]
#[derive(serde::Serialize)]
struct HotkeyState {
    hotkey: String,
}

#[cfg(any(windows, target_os = "macos"))]
#[tauri::command]
async fn get_toggle_hotkey(state: State<'_, AppState>) -> Result<HotkeyState, String> {
    Ok(HotkeyState { hotkey: current_hotkey(&state) })
}

#[cfg(any(windows, target_os = "macos"))]
fn current_hotkey(state: &State<'_, AppState>) -> String {
    state.toggle_hotkey.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

#[cfg(any(windows, target_os = "macos"))]
#[tauri::command]
async fn set_toggle_hotkey(
    state: State<'_, AppState>,
    app: tauri::AppHandle,
    hotkey: String,
) -> Result<HotkeyState, String> {
    let prev = current_hotkey(&state);
    if prev == hotkey {
        return Ok(HotkeyState { hotkey });
    }

    let _ = app.global_shortcut().unregister(prev.as_str());

    // The actual shortcut handler lives in `setup`; re-registering here only swaps the key it
    // listens on, since `tauri_plugin_global_shortcut` dispatches by the registered pattern.
    let res = app.global_shortcut().on_shortcut(hotkey.as_str(), {
        let app = app.clone();
        move |_app, _shortcut, event| {
            if event.state != tauri_plugin_global_shortcut::ShortcutState::Pressed {
                return;
            }
            let app = app.clone();
            tauri::async_runtime::spawn(async move {
                let state = app.state::<AppState>();
                state.service.handle_intent(justwhisper_core::Intent::StartOrStop).await;
            });
        }
    });

    if let Err(e) = res {
        return Err(format!("failed to register hotkey: {e}"));
    }

    *state.toggle_hotkey.lock().unwrap_or_else(|p| p.into_inner()) = hotkey.clone();

    if let Ok(store) = app.store(OVERLAY_POSITION_STORE_PATH) {
        store.set(HOTKEY_STORE_KEY, serde_json::Value::String(hotkey.clone()));
        let _ = store.save();
    }

    let _ = app.emit(EVENT_TOGGLE_HOTKEY_CHANGED, hotkey.clone());

    Ok(HotkeyState { hotkey })
}

#[tauri::command]
async fn overlay_drag_begin(_app: tauri::AppHandle) -> Result<(), String> {
    let flag = OVERLAY_IS_DRAGGING.get_or_init(|| std::sync::atomic::AtomicBool::new(false));
    flag.store(true, std::sync::atomic::Ordering::SeqCst);
    Ok(())
}

#[tauri::command]
async fn overlay_drag_end(app: tauri::AppHandle) -> Result<(), String> {
    let flag = OVERLAY_IS_DRAGGING.get_or_init(|| std::sync::atomic::AtomicBool::new(false));
    flag.store(false, std::sync::atomic::Ordering::SeqCst);

    if let Some(w) = app.get_webview_window("recording_overlay") {
        if let Ok(pos) = w.outer_position() {
            if let Ok(store) = app.store(OVERLAY_POSITION_STORE_PATH) {
                let payload = OverlayMovedPayload { x: pos.x, y: pos.y };
                if let Ok(v) = serde_json::to_value(&payload) {
                    store.set(OVERLAY_POSITION_STORE_KEY, v);
                    let _ = store.save();
                }
            }
        }
    }

    Ok(())
}

#[tauri::command]
async fn overlay_set_size(app: tauri::AppHandle, width: f64, height: f64) -> Result<(), String> {
    if let Some(w) = app.get_webview_window("recording_overlay") {
        let _ = w.set_size(tauri::Size::Logical(tauri::LogicalSize::new(width, height)));

        let has_saved_position = app
            .store(OVERLAY_POSITION_STORE_PATH)
            .ok()
            .and_then(|s| s.get(OVERLAY_POSITION_STORE_KEY))
            .is_some();

        if !has_saved_position {
            if let Ok(Some(monitor)) = w.current_monitor().or_else(|_| w.primary_monitor()) {
                let work = monitor.work_area();
                if let Ok(size) = w.outer_size() {
                    let x = work.position.x + (work.size.width as i32 / 2) - (size.width as i32 / 2);
                    let y = work.position.y + work.size.height as i32 - OVERLAY_BOTTOM_OFFSET - (size.height as i32);
                    let _ = w.set_position(tauri::Position::Physical(tauri::PhysicalPosition::new(x, y)));
                }
            }
        }
    }
    Ok(())
}

#[tauri::command]
async fn overlay_dismiss(app: tauri::AppHandle) -> Result<(), String> {
    if let Some(w) = app.get_webview_window("recording_overlay") {
        let _ = w.hide();
    }
    Ok(())
}

#[tauri::command]
async fn show_main_window(app: tauri::AppHandle) -> Result<(), String> {
    if let Some(w) = app.get_webview_window("main") {
        let _ = w.show();
        let _ = w.set_focus();
    }
    Ok(())
}

#[cfg(target_os = "macos")]
#[tauri::command]
async fn open_macos_accessibility_settings() -> Result<(), String> {
    use std::process::Command;
    let url = "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";
    let status = Command::new("open").arg(url).status().map_err(|e| e.to_string())?;
    if status.success() { Ok(()) } else { Err("failed to open Accessibility settings".into()) }
}

#[cfg(target_os = "macos")]
#[tauri::command]
async fn open_macos_microphone_settings() -> Result<(), String> {
    use std::process::Command;
    let url = "x-apple.systempreferences:com.apple.preference.security?Privacy_Microphone";
    let status = Command::new("open").arg(url).status().map_err(|e| e.to_string())?;
    if status.success() { Ok(()) } else { Err("failed to open Microphone settings".into()) }
}

fn main() {
    // Persist logs to the OS log dir so Windows users can debug issues even in
    // `windows_subsystem = "windows"` builds (no console output).
    use tauri_plugin_log::{Target, TargetKind};

    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(log::LevelFilter::Info)
                .targets([Target::new(TargetKind::LogDir { file_name: Some("justwhisper".into()) })])
                .build(),
        )
        .plugin(tauri_plugin_store::Builder::default().build())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(w) = app.get_webview_window("main") {
                let _ = w.show();
                let _ = w.set_focus();
            }
        }))
        .setup(|app| {
            let handle = app.handle();

            #[cfg(any(windows, target_os = "macos"))]
            let service = build_service(handle)?;
            #[cfg(not(any(windows, target_os = "macos")))]
            let service: Arc<AppService> = {
                let config_path = default_config_path(handle)?;
                let recorder: Arc<dyn justwhisper_engine::traits::Recorder> =
                    Arc::new(justwhisper_platform::test::NullRecorder::default());
                let output = justwhisper_platform::test::MemoryOutputSink::boxed();
                let probe: Arc<dyn justwhisper_engine::permission::PermissionProbe> =
                    Arc::new(justwhisper_platform::test::AlwaysGrantedProbe::default());
                Arc::new(AppService::new(config_path, recorder, output, probe)?)
            };

            app.manage(AppState {
                service: service.clone(),

                #[cfg(any(windows, target_os = "macos"))]
                toggle_hotkey: std::sync::Mutex::new(DEFAULT_TOGGLE_HOTKEY.into()),
            });

            // Overlay window (hidden by default). This is the primary UX feedback surface.
            // Default size is only used until the webview measures the HUD pill.
            let overlay = WebviewWindowBuilder::new(
                handle,
                "recording_overlay",
                WebviewUrl::App("src/overlay.html".into()),
            )
            .title("JustWhisper")
            .visible(false)
            .focusable(false)
            .resizable(false)
            .decorations(false)
            .always_on_top(true)
            .skip_taskbar(true)
            .transparent(true)
            .shadow(false)
            .inner_size(240.0, 72.0)
            .build()?;

            #[cfg(windows)]
            {
                let _ = apply_acrylic(&overlay, Some((0, 0, 0, 0)));
            }

            #[cfg(windows)]
            {
                if let Some(main_w) = app.get_webview_window("main") {
                    let _ = apply_tabbed(&main_w, None);
                }
            }

            // IMPORTANT: do not set the overlay window as click-through by default.
            // The HUD contains interactive controls (Stop/Cancel/Dismiss) and must receive
            // pointer events.

            let mut restored = false;
            if let Ok(store) = app.store(OVERLAY_POSITION_STORE_PATH) {
                if let Some(v) = store.get(OVERLAY_POSITION_STORE_KEY) {
                    if let Ok(p) = serde_json::from_value::<OverlayMovedPayload>(v) {
                        if let Ok(monitors) = overlay.available_monitors() {
                            let fits_any = monitors.iter().any(|m| {
                                let work = m.work_area();
                                let left = work.position.x;
                                let top = work.position.y;
                                let right = work.position.x + work.size.width as i32;
                                let bottom = work.position.y + work.size.height as i32;
                                p.x >= left && p.x <= right && p.y >= top && p.y <= bottom
                            });

                            if fits_any {
                                let _ = overlay
                                    .set_position(tauri::Position::Physical(tauri::PhysicalPosition::new(p.x, p.y)));
                                restored = true;
                            }
                        }
                    }
                }
            }

            if !restored {
                if let Ok(Some(monitor)) = overlay.current_monitor().or_else(|_| overlay.primary_monitor()) {
                    let work = monitor.work_area();
                    let size = &work.size;
                    let pos = &work.position;

                    if let Ok(size_px) = overlay.outer_size() {
                        let x = pos.x + (size.width as i32 / 2) - (size_px.width as i32 / 2);
                        let y = pos.y + size.height as i32 - OVERLAY_BOTTOM_OFFSET - (size_px.height as i32);
                        let _ = overlay.set_position(tauri::Position::Physical(tauri::PhysicalPosition::new(x, y)));
                    }
                }
            }

            // Persist overlay position only while the user is actively dragging, to avoid
            // persisting on normal clicks or programmatic moves.
            let store_for_events = app.store(OVERLAY_POSITION_STORE_PATH).ok();
            overlay.on_window_event({
                let store_for_events = store_for_events.clone();
                move |event| {
                    use tauri::WindowEvent;
                    if !matches!(event, WindowEvent::Moved(_)) {
                        return;
                    }

                    let flag = OVERLAY_IS_DRAGGING
                        .get_or_init(|| std::sync::atomic::AtomicBool::new(false))
                        .load(std::sync::atomic::Ordering::SeqCst);
                    if !flag {
                        return;
                    }

                    let WindowEvent::Moved(pos) = event else { return };

                    if let Some(store) = store_for_events.as_ref() {
                        let payload = OverlayMovedPayload { x: pos.x, y: pos.y };
                        if let Ok(v) = serde_json::to_value(&payload) {
                            store.set(OVERLAY_POSITION_STORE_KEY, v);
                            let _ = store.save();
                        }
                    }
                }
            });

            let _overlay = overlay;

            let show_main = MenuItemBuilder::new("Show").id("show").build(handle)?;
            let toggle = MenuItemBuilder::new("Start Recording").id("toggle_recording").build(handle)?;
            let cancel = MenuItemBuilder::new("Cancel Recording").id("cancel_recording").build(handle)?;
            let reset_hud_position = MenuItemBuilder::new("Reset HUD Position").id("reset_hud_position").build(handle)?;
            let quit = MenuItemBuilder::new("Quit").id("quit").build(handle)?;

            let menu = MenuBuilder::new(handle)
                .items(&[&show_main, &toggle, &cancel, &reset_hud_position, &quit])
                .build()?;

            let mut tray_builder = TrayIconBuilder::with_id("tray").menu(&menu);
            if let Some(icon) = load_tray_icon(handle) {
                tray_builder = tray_builder.icon(icon);
            }

            let tray_service = service.clone();
            let tray = tray_builder
                .on_menu_event(move |app, event| match event.id().as_ref() {
                    "show" => {
                        if let Some(w) = app.get_webview_window("main") {
                            let _ = w.show();
                            let _ = w.set_focus();
                        }
                    }
                    "toggle_recording" => {
                        let service = tray_service.clone();
                        let toggle_item = toggle.clone();
                        tauri::async_runtime::spawn(async move {
                            service.handle_intent(justwhisper_core::Intent::StartOrStop).await;
                            let is_recording =
                                matches!(service.overlay_state().await, justwhisper_engine::SessionState::Recording { .. });
                            let _ = toggle_item.set_text(if is_recording { "Stop Recording" } else { "Start Recording" });
                        });
                    }
                    "cancel_recording" => {
                        let service = tray_service.clone();
                        tauri::async_runtime::spawn(async move {
                            service.handle_intent(justwhisper_core::Intent::Cancel).await;
                        });
                    }
                    "reset_hud_position" => {
                        if let Ok(store) = app.store(OVERLAY_POSITION_STORE_PATH) {
                            store.delete(OVERLAY_POSITION_STORE_KEY);
                            let _ = store.save();
                        }

                        if let Some(overlay) = app.get_webview_window("recording_overlay") {
                            if let Ok(Some(monitor)) = overlay.current_monitor().or_else(|_| overlay.primary_monitor()) {
                                let work = monitor.work_area();
                                if let Ok(size) = overlay.outer_size() {
                                    let x = work.position.x + (work.size.width as i32 / 2) - (size.width as i32 / 2);
                                    let y =
                                        work.position.y + work.size.height as i32 - OVERLAY_BOTTOM_OFFSET - (size.height as i32);
                                    let _ =
                                        overlay.set_position(tauri::Position::Physical(tauri::PhysicalPosition::new(x, y)));
                                }
                            }
                        }
                    }
                    "quit" => {
                        app.exit(0);
                    }
                    _ => {}
                })
                .build(handle)?;

            #[cfg(any(windows, target_os = "macos"))]
            {
                let app_handle = handle.clone();
                let app_state = app.state::<AppState>();

                let persisted = app
                    .store(OVERLAY_POSITION_STORE_PATH)
                    .ok()
                    .and_then(|s| s.get(HOTKEY_STORE_KEY))
                    .and_then(|v| v.as_str().map(|s| s.to_string()));
                let hotkey = persisted.unwrap_or_else(|| DEFAULT_TOGGLE_HOTKEY.into());

                *app_state.toggle_hotkey.lock().unwrap_or_else(|p| p.into_inner()) = hotkey.clone();

                let _ = app_handle.global_shortcut().on_shortcut(hotkey.as_str(), {
                    let service = service.clone();
                    move |_app, _shortcut, event| {
                        if event.state != tauri_plugin_global_shortcut::ShortcutState::Pressed {
                            return;
                        }
                        let service = service.clone();
                        tauri::async_runtime::spawn(async move {
                            service.handle_intent(justwhisper_core::Intent::StartOrStop).await;
                        });
                    }
                });

                // Input-monitoring-gated event tap (CopyOnly/Cancel while recording, plus the
                // OS-level Primary key on platforms whose tap also owns it).
                #[cfg(target_os = "macos")]
                let hotkey_controller = justwhisper_platform::MacosHotkeyController::new();
                #[cfg(windows)]
                let hotkey_controller = justwhisper_platform::WindowsHotkeyController::new();

                let gate = service.permissions().clone();
                let intent_rx = hotkey_controller.start(move || gate.input_monitoring_granted());

                session_controller::spawn(app_handle, service.clone(), intent_rx);

                // Leak the controller for the process lifetime; it owns the OS event tap thread.
                std::mem::forget(hotkey_controller);
            }

            #[cfg(not(any(windows, target_os = "macos")))]
            {
                let (_tx, rx) = tokio::sync::mpsc::channel(1);
                session_controller::spawn(handle.clone(), service.clone(), rx);
            }

            let _ = tray;

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_config,
            set_config,
            list_devices,
            select_device,
            toggle_recording,
            stop_copy_only,
            cancel_recording,
            get_log_snapshot,
            #[cfg(any(windows, target_os = "macos"))]
            get_toggle_hotkey,
            #[cfg(any(windows, target_os = "macos"))]
            set_toggle_hotkey,
            capture_foreground_app,
            overlay_drag_begin,
            overlay_drag_end,
            overlay_set_size,
            overlay_dismiss,
            show_main_window,
            #[cfg(target_os = "macos")]
            open_macos_accessibility_settings,
            #[cfg(target_os = "macos")]
            open_macos_microphone_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
