mod resample;

pub mod devices;

#[cfg(any(windows, target_os = "macos"))]
mod recorder;

pub use devices::{list_input_devices, DeviceRegistry, DeviceRegistryError};

#[cfg(any(windows, target_os = "macos"))]
pub use recorder::{AudioCaptureError, AudioRecorder, CapturedAudio, RecordingHandle, TARGET_SAMPLE_RATE_HZ};
