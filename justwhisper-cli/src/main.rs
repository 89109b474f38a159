//! Headless end-to-end runner for scripted/manual testing: drives `AppService` the same way the
//! Tauri shell does, minus the windowing. Type `start`, `stop`, `cancel`, or `quit` on stdin and
//! watch the overlay state and log ring mirror what the real app would show.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Context;
use justwhisper_appcore::AppService;
use justwhisper_core::Intent;

#[cfg(any(windows, target_os = "macos"))]
fn build_service(config_path: std::path::PathBuf) -> anyhow::Result<Arc<AppService>> {
    let scratch_dir = config_path
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .join("capture");

    #[cfg(target_os = "macos")]
    let (output, probe) = (
        Arc::new(justwhisper_platform::MacosOutputSink::default()) as Arc<dyn justwhisper_engine::traits::OutputSink>,
        Arc::new(justwhisper_platform::MacosPermissionProbe) as Arc<dyn justwhisper_engine::permission::PermissionProbe>,
    );

    #[cfg(windows)]
    let (output, probe) = (
        Arc::new(justwhisper_platform::WindowsOutputSink::default()) as Arc<dyn justwhisper_engine::traits::OutputSink>,
        Arc::new(justwhisper_platform::WindowsPermissionProbe) as Arc<dyn justwhisper_engine::permission::PermissionProbe>,
    );

    Ok(Arc::new(AppService::with_platform_recorder(config_path, scratch_dir, output, probe)?))
}

/// No `justwhisper-audio` capture graph or TCC-equivalent probe exists for this host, so the
/// runner falls back to the in-memory test doubles; recording intents will fail cleanly.
#[cfg(not(any(windows, target_os = "macos")))]
fn build_service(config_path: std::path::PathBuf) -> anyhow::Result<Arc<AppService>> {
    eprintln!("warning: no platform recorder on this host, recording intents will fail");
    let recorder = Arc::new(justwhisper_platform::test::NullRecorder::default());
    let output = justwhisper_platform::test::MemoryOutputSink::boxed();
    let probe = Arc::new(justwhisper_platform::test::AlwaysGrantedProbe::default());
    Ok(Arc::new(AppService::new(config_path, recorder, output, probe)?))
}

async fn relay_overlay(service: Arc<AppService>) {
    let mut rx = service.subscribe_overlay();
    loop {
        let state = rx.borrow_and_update().clone();
        println!("[overlay] {state:?}");
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn relay_log(service: Arc<AppService>) {
    let mut last_len = 0usize;
    loop {
        let entries = service.log_snapshot().await;
        for entry in entries.iter().skip(last_len) {
            println!("[log:{:?}] {}", entry.severity, entry.message);
        }
        last_len = entries.len();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

fn parse_intent(line: &str) -> Option<Intent> {
    match line.trim() {
        "start" | "stop" => Some(Intent::StartOrStop),
        "copy" => Some(Intent::StopCopyOnly),
        "cancel" => Some(Intent::Cancel),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("JUSTWHISPER_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("justwhisper-cli-config.json"));

    let service = build_service(config_path).context("failed to start app service")?;

    tokio::spawn(relay_overlay(service.clone()));
    tokio::spawn(relay_log(service.clone()));

    println!("justwhisper-cli: commands are start/stop, copy, cancel, quit");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        match parse_intent(trimmed) {
            Some(intent) => service.handle_intent(intent).await,
            None if trimmed.is_empty() => {}
            None => println!("unrecognized command: {trimmed}"),
        }
    }

    Ok(())
}
