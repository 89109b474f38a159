//! macOS global hotkey interception (C5) via `CGEventTap`.
//!
//! Three monitored keys, matched on raw key code: Primary (Fn, detected through the
//! `FlagsChanged` secondary-fn modifier rather than a keycode), CopyOnly (left Control) and
//! Cancel (Escape). The tap runs `Default` (not `ListenOnly`) so CopyOnly/Cancel can be
//! swallowed per spec; Primary always passes through.

#![cfg(target_os = "macos")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, EventField,
};
use justwhisper_core::Intent;
use tokio::sync::mpsc;

const VK_CONTROL: u16 = 0x3B;
const VK_ESCAPE: u16 = 0x35;

const PERMISSION_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Mirrors C8's recording state without polling or shared locks, per §4.5.
pub struct MacosHotkeyController {
    is_recording: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
}

impl MacosHotkeyController {
    pub fn new() -> Self {
        Self { is_recording: Arc::new(AtomicBool::new(false)), stop_flag: Arc::new(AtomicBool::new(false)) }
    }

    /// Called by C8 on every state transition so the tap callback knows whether CopyOnly/Cancel
    /// apply, without touching any lock the callback thread could contend on.
    pub fn reset_recording_state(&self, is_recording: bool) {
        self.is_recording.store(is_recording, Ordering::SeqCst);
    }

    /// Blocks (on a dedicated OS thread) until the input-monitoring permission is granted,
    /// retrying every 2s, then installs the tap and forwards intents until `stop()`.
    pub fn start(&self, permission_granted: impl Fn() -> bool + Send + 'static) -> mpsc::Receiver<Intent> {
        let (tx, rx) = mpsc::channel(32);
        let is_recording = self.is_recording.clone();
        let stop_flag = self.stop_flag.clone();

        std::thread::spawn(move || {
            while !permission_granted() {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                std::thread::sleep(PERMISSION_RETRY_INTERVAL);
            }
            if let Err(e) = run_event_tap(is_recording, stop_flag, tx) {
                log::error!("macos hotkey tap failed: {e}");
            }
        });

        rx
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Default for MacosHotkeyController {
    fn default() -> Self {
        Self::new()
    }
}

fn run_event_tap(
    is_recording: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    tx: mpsc::Sender<Intent>,
) -> anyhow::Result<()> {
    let (event_tx, event_rx) = std_mpsc::channel::<Intent>();
    let fn_pressed = Arc::new(AtomicBool::new(false));
    let fn_pressed_cb = fn_pressed.clone();
    let is_recording_cb = is_recording.clone();
    let stop_flag_cb = stop_flag.clone();

    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                          event_type: CGEventType,
                          event: &CGEvent|
          -> Option<CGEvent> {
        if stop_flag_cb.load(Ordering::SeqCst) {
            CFRunLoop::get_current().stop();
            return Some(event.clone());
        }

        // macOS disables the tap on a callback timeout or suspicious input; re-enabling is the
        // caller's job once it notices the tap stopped delivering events. We just let the event
        // through so the run loop keeps spinning and `run_in_mode` returns on schedule.
        if matches!(event_type, CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput) {
            return Some(event.clone());
        }

        let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
        let recording = is_recording_cb.load(Ordering::SeqCst);

        match event_type {
            CGEventType::KeyDown => {
                if recording && key_code == VK_CONTROL {
                    let _ = event_tx.send(Intent::StopCopyOnly);
                    return None;
                }
                if recording && key_code == VK_ESCAPE {
                    let _ = event_tx.send(Intent::Cancel);
                    return None;
                }
            }
            CGEventType::FlagsChanged => {
                let fn_now = event.get_flags().contains(CGEventFlags::CGEventFlagSecondaryFn);
                let was = fn_pressed_cb.load(Ordering::SeqCst);
                if fn_now && !was {
                    fn_pressed_cb.store(true, Ordering::SeqCst);
                    let _ = event_tx.send(Intent::StartOrStop);
                } else if !fn_now && was {
                    fn_pressed_cb.store(false, Ordering::SeqCst);
                }
            }
            _ => {}
        }

        Some(event.clone())
    };

    let event_tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::Default,
        vec![CGEventType::KeyDown, CGEventType::KeyUp, CGEventType::FlagsChanged],
        callback,
    )
    .map_err(|_| anyhow::anyhow!("failed to create event tap; input monitoring permission required"))?;

    event_tap.enable();

    let run_loop_source = event_tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| anyhow::anyhow!("failed to create run loop source"))?;
    let run_loop = CFRunLoop::get_current();
    run_loop.add_source(&run_loop_source, unsafe { kCFRunLoopCommonModes });

    std::thread::spawn(move || {
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                return;
            }
            match event_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(intent) => {
                    if tx.blocking_send(intent).is_err() {
                        return;
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }
    });

    while !stop_flag.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, Duration::from_millis(100), true);
    }

    Ok(())
}
