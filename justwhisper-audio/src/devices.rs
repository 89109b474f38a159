//! The Device Registry (C3): enumeration, hot-plug diffing, and the persisted selection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use justwhisper_core::{AudioDevice, DeviceUid, DEFAULT_DEVICE_UID};
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum DeviceRegistryError {
    #[error("failed to list input devices: {0}")]
    ListDevices(#[from] cpal::DevicesError),
}

/// §4.3: devices with zero input channels are excluded.
pub fn list_input_devices() -> Result<Vec<AudioDevice>, DeviceRegistryError> {
    let host = cpal::default_host();
    let mut out = vec![AudioDevice::default_sentinel()];
    for dev in host.input_devices()? {
        let Ok(name) = dev.name() else { continue };
        let channels = dev.default_input_config().map(|c| c.channels()).unwrap_or(0);
        if channels == 0 {
            continue;
        }
        out.push(AudioDevice { uid: device_uid_for_name(&name), name, input_channels: channels });
    }
    Ok(out)
}

/// cpal exposes no persistent hardware identifier across hosts, so the device name is the
/// most stable handle available; this collides if two identically-named devices are attached
/// at once, a limitation the device UID type doesn't try to paper over.
fn device_uid_for_name(name: &str) -> DeviceUid {
    DeviceUid::new(name.to_string())
}

/// Owns the polling loop that detects hot-plug and the user's persisted selection.
pub struct DeviceRegistry {
    devices_rx: watch::Receiver<Vec<AudioDevice>>,
    selected: Arc<Mutex<DeviceUid>>,
    _poll_handle: std::thread::JoinHandle<()>,
}

impl DeviceRegistry {
    pub fn start(initial_selection: DeviceUid) -> Self {
        let initial = list_input_devices().unwrap_or_else(|_| vec![AudioDevice::default_sentinel()]);
        let (tx, devices_rx) = watch::channel(initial);
        let poll_handle = std::thread::spawn(move || loop {
            std::thread::sleep(POLL_INTERVAL);
            if let Ok(list) = list_input_devices() {
                if tx.send(list).is_err() {
                    return;
                }
            }
        });
        Self { devices_rx, selected: Arc::new(Mutex::new(initial_selection)), _poll_handle: poll_handle }
    }

    /// Emits on every poll tick, whether or not the list actually changed; subscribers that
    /// care about a `devicesChanged` edge diff two consecutive snapshots themselves.
    pub fn subscribe(&self) -> watch::Receiver<Vec<AudioDevice>> {
        self.devices_rx.clone()
    }

    pub fn current(&self) -> Vec<AudioDevice> {
        self.devices_rx.borrow().clone()
    }

    pub fn selected(&self) -> DeviceUid {
        self.selected.lock().expect("device registry mutex poisoned").clone()
    }

    /// §4.3: resolving an absent UID falls back to `Default` and overwrites the stored UID.
    pub fn select(&self, uid: DeviceUid) -> DeviceUid {
        let resolved = if uid.as_str() == DEFAULT_DEVICE_UID
            || self.current().iter().any(|d| d.uid == uid)
        {
            uid
        } else {
            DeviceUid::new(DEFAULT_DEVICE_UID)
        };
        *self.selected.lock().expect("device registry mutex poisoned") = resolved.clone();
        resolved
    }

    pub fn resolve(&self, uid: &DeviceUid) -> AudioDevice {
        self.current()
            .into_iter()
            .find(|d| &d.uid == uid)
            .unwrap_or_else(AudioDevice::default_sentinel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_unknown_uid_falls_back_to_default() {
        let registry = DeviceRegistry::start(DeviceUid::new(DEFAULT_DEVICE_UID));
        let resolved = registry.select(DeviceUid::new("nonexistent-device"));
        assert_eq!(resolved.as_str(), DEFAULT_DEVICE_UID);
        assert_eq!(registry.selected().as_str(), DEFAULT_DEVICE_UID);
    }

    #[test]
    fn resolving_unknown_uid_returns_default_sentinel() {
        let registry = DeviceRegistry::start(DeviceUid::new(DEFAULT_DEVICE_UID));
        let device = registry.resolve(&DeviceUid::new("nonexistent-device"));
        assert!(device.is_default());
    }
}
