// Windows clipboard-based Output Sink (C9).
//
// Strategy:
// - Save current clipboard text (best-effort)
// - Write our text to clipboard
// - If mode == Paste, send Ctrl+V
// - Restore clipboard

#![cfg(windows)]

use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use clipboard_win::{get_clipboard_string, set_clipboard_string};
use enigo::Keyboard;
use justwhisper_core::OutputMode;
use justwhisper_engine::traits::{OutputError, OutputSink};

fn send_paste_ctrl_v(enigo: &mut enigo::Enigo) -> Result<(), OutputError> {
    enigo
        .key(enigo::Key::Control, enigo::Direction::Press)
        .map_err(|e| OutputError::Paste(format!("failed to press Ctrl: {e}")))?;
    enigo
        .key(enigo::Key::Other(0x56), enigo::Direction::Click)
        .map_err(|e| OutputError::Paste(format!("failed to press V: {e}")))?;
    thread::sleep(Duration::from_millis(100));
    enigo
        .key(enigo::Key::Control, enigo::Direction::Release)
        .map_err(|e| OutputError::Paste(format!("failed to release Ctrl: {e}")))?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct WindowsOutputSink;

#[async_trait]
impl OutputSink for WindowsOutputSink {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || write_and_maybe_paste(&text, mode))
            .await
            .map_err(|e| OutputError::Clipboard(format!("output task panicked: {e}")))?
    }
}

fn write_and_maybe_paste(text: &str, mode: OutputMode) -> Result<(), OutputError> {
    let original = get_clipboard_string().ok();

    set_clipboard_string(text).map_err(|e| OutputError::Clipboard(format!("failed to write clipboard: {e}")))?;
    thread::sleep(Duration::from_millis(50));

    let paste_result = if mode == OutputMode::Paste {
        (|| {
            let mut enigo = enigo::Enigo::new(&enigo::Settings::default())
                .map_err(|e| OutputError::Paste(format!("failed to init enigo: {e}")))?;
            send_paste_ctrl_v(&mut enigo)
        })()
    } else {
        Ok(())
    };

    thread::sleep(Duration::from_millis(50));
    if let Some(original) = original {
        let _ = set_clipboard_string(&original);
    }

    paste_result
}
