// macOS clipboard-based Output Sink (C9).
//
// Requirements:
// - Preserve the full NSPasteboard contents (all items, all types/data) and restore after paste.
// - Paste using CGEvent Cmd+V (no AppleScript fallback).
// - Requires Accessibility permission (AXIsProcessTrusted).
//
// This file is only compiled on macOS.

#![cfg(target_os = "macos")]

use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use core_foundation::base::TCFType;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{msg_send, runtime::ProtocolObject};
use objc2_app_kit::{
    NSPasteboard, NSPasteboardItem, NSPasteboardType, NSPasteboardTypeString, NSPasteboardWriting,
};
use objc2_foundation::{NSArray, NSData, NSString};

use justwhisper_core::OutputMode;
use justwhisper_engine::traits::{OutputError, OutputSink};

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrustedWithOptions(options: *const AnyObject) -> bool;
    static kAXTrustedCheckOptionPrompt: *const AnyObject;
}

fn is_accessibility_trusted() -> bool {
    unsafe {
        let key = CFString::wrap_under_create_rule(kAXTrustedCheckOptionPrompt.cast());
        let value = core_foundation::boolean::CFBoolean::false_value();
        let options = CFDictionary::from_CFType_pairs(&[(key, value)]);
        AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef().cast())
    }
}

#[derive(Debug, Clone)]
struct PasteboardItemSnapshot {
    types: Vec<(String, Vec<u8>)>,
}

const SNAPSHOT_MAX_TOTAL_BYTES: usize = 8 * 1024 * 1024;

fn snapshot_pasteboard(pasteboard: &NSPasteboard) -> Vec<PasteboardItemSnapshot> {
    let mut out = Vec::new();
    let mut total = 0usize;

    let items: Option<Retained<NSArray<NSPasteboardItem>>> = unsafe { pasteboard.pasteboardItems() };
    let Some(items) = items else {
        return out;
    };

    for item in items.iter() {
        let mut entry = PasteboardItemSnapshot { types: Vec::new() };

        let types: Retained<NSArray<NSPasteboardType>> = unsafe { item.types() };
        for t in types.iter() {
            let ty: Retained<NSString> = unsafe { msg_send![t, copy] };
            let ty_str = ty.to_string();

            let data: Option<Retained<NSData>> = unsafe { item.dataForType(&*t) };
            let Some(data) = data else {
                continue;
            };

            let bytes = data.bytes();
            let len = data.length();
            if len == 0 {
                continue;
            }

            if total.saturating_add(len) > SNAPSHOT_MAX_TOTAL_BYTES {
                return Vec::new();
            }

            // SAFETY: NSData guarantees `bytes` is valid for `length` bytes.
            let slice = unsafe { std::slice::from_raw_parts(bytes.cast::<u8>(), len) };
            entry.types.push((ty_str, slice.to_vec()));
            total += len;
        }

        if !entry.types.is_empty() {
            out.push(entry);
        }
    }

    out
}

fn restore_pasteboard(pasteboard: &NSPasteboard, snapshot: &[PasteboardItemSnapshot]) {
    unsafe {
        pasteboard.clearContents();
    }

    if snapshot.is_empty() {
        return;
    }

    let mut items: Vec<Retained<NSPasteboardItem>> = Vec::with_capacity(snapshot.len());

    for item in snapshot {
        let pb_item = unsafe { NSPasteboardItem::new() };

        for (ty, bytes) in &item.types {
            let ns_ty = NSString::from_str(ty);
            let ns_data = NSData::with_bytes(bytes);
            let _ok: bool = unsafe { pb_item.setData_forType(&ns_data, &ns_ty) };
        }

        items.push(pb_item);
    }

    let mut as_proto: Vec<Retained<ProtocolObject<dyn NSPasteboardWriting>>> = Vec::with_capacity(items.len());
    for it in items {
        as_proto.push(ProtocolObject::from_retained(it));
    }

    let objects = NSArray::from_retained_slice(&as_proto);
    let _ = pasteboard.writeObjects(&objects);
}

fn post_cmd_v() -> Result<(), OutputError> {
    let src = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| OutputError::Paste("failed to create CGEventSource".into()))?;

    let cmd_key: u16 = 0x37;
    let v_key: u16 = 0x09;
    let mut flags = CGEventFlags::CGEventFlagCommand;

    let cmd_down = CGEvent::new_keyboard_event(src.clone(), cmd_key, true)
        .map_err(|_| OutputError::Paste("failed to create cmd down event".into()))?;
    cmd_down.set_flags(flags);
    cmd_down.post(CGEventTapLocation::HID);

    let v_down = CGEvent::new_keyboard_event(src.clone(), v_key, true)
        .map_err(|_| OutputError::Paste("failed to create v down event".into()))?;
    v_down.set_flags(flags);
    v_down.post(CGEventTapLocation::HID);

    let v_up = CGEvent::new_keyboard_event(src.clone(), v_key, false)
        .map_err(|_| OutputError::Paste("failed to create v up event".into()))?;
    v_up.set_flags(flags);
    v_up.post(CGEventTapLocation::HID);

    flags.remove(CGEventFlags::CGEventFlagCommand);
    let cmd_up = CGEvent::new_keyboard_event(src, cmd_key, false)
        .map_err(|_| OutputError::Paste("failed to create cmd up event".into()))?;
    cmd_up.set_flags(flags);
    cmd_up.post(CGEventTapLocation::HID);

    Ok(())
}

#[derive(Debug, Default)]
pub struct MacosOutputSink;

#[async_trait]
impl OutputSink for MacosOutputSink {
    async fn emit(&self, text: &str, mode: OutputMode) -> Result<(), OutputError> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || write_and_maybe_paste(&text, mode))
            .await
            .map_err(|e| OutputError::Clipboard(format!("output task panicked: {e}")))?
    }
}

fn write_and_maybe_paste(text: &str, mode: OutputMode) -> Result<(), OutputError> {
    let pasteboard = NSPasteboard::generalPasteboard();
    let original_change = pasteboard.changeCount();
    let snapshot = snapshot_pasteboard(&pasteboard);

    unsafe {
        pasteboard.clearContents();
    }

    let ns_text = NSString::from_str(text);
    let _ = pasteboard.setString_forType(&ns_text, NSPasteboardTypeString);
    let after_write_change = pasteboard.changeCount();

    if mode == OutputMode::CopyOnly {
        return Ok(());
    }

    if !is_accessibility_trusted() {
        return Err(OutputError::Paste(
            "Accessibility permission is required to paste into other apps".into(),
        ));
    }

    thread::sleep(Duration::from_millis(50));
    post_cmd_v()?;

    thread::sleep(Duration::from_millis(1000));
    let current_change = pasteboard.changeCount();
    if current_change == after_write_change || current_change == original_change {
        restore_pasteboard(&pasteboard, &snapshot);
    }

    Ok(())
}
