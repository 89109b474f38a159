//
// CPAL-based audio recorder, the Recorder (C4).
//
// Supported platforms:
// - Windows
// - macOS
//
// Linux support is intentionally not enabled yet because we don't want to introduce
// new platform dependencies without committing to a full Linux UX.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream};
use justwhisper_core::AudioDevice;

use crate::resample::resample_mono_f32;

/// §4.7: the Speech Client expects 32-bit float PCM, mono, 44.1 kHz.
pub const TARGET_SAMPLE_RATE_HZ: u32 = 44_100;

const WIRELESS_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum AudioCaptureError {
    #[error("no input device found")]
    NoInputDevice,

    #[error("microphone permission was not granted")]
    PermissionDenied,

    #[error("selected device is unavailable")]
    DeviceUnavailable,

    #[error("failed to list input devices: {0}")]
    ListDevices(#[from] cpal::DevicesError),

    #[error("failed to query supported configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to get default config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio worker failed: {0}")]
    Worker(String),

    #[error("audio worker startup timeout")]
    WorkerTimeout,

    #[error("recording stop timed out")]
    StopTimeout,

    #[error("failed to resample: {0}")]
    Resample(anyhow::Error),

    #[error("recording not started")]
    NotStarted,

    #[error("internal channel error")]
    Channel,

    #[error("output file error: {0}")]
    Io(#[from] std::io::Error),
}

/// §4.4: returned by `start`, passed back into `stop`/`set_device`.
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    pub output_path: PathBuf,
    pub sample_rate_hz: u32,
}

pub struct CapturedAudio {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

enum Cmd {
    Start,
    Stop(mpsc::Sender<Result<(), AudioCaptureError>>),
    Shutdown,
}

enum WorkerMsg {
    Ready,
    Error(String),
}

type LevelCallback = Arc<Mutex<Option<Arc<dyn Fn(f32) + Send + Sync + 'static>>>>;

pub struct AudioRecorder {
    cmd_tx: mpsc::Sender<Cmd>,
    worker_handle: Option<std::thread::JoinHandle<()>>,
    handle: RecordingHandle,
    level_cb: LevelCallback,
}

impl AudioRecorder {
    pub fn set_level_callback<F>(&self, cb: F)
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        let mut guard = self.level_cb.lock().expect("level callback mutex poisoned");
        *guard = Some(Arc::new(cb));
    }

    pub fn handle(&self) -> &RecordingHandle {
        &self.handle
    }

    /// §4.4 step 1-4: build the capture graph for `device`, retrying once against the
    /// system default if the requested device fails to open.
    pub fn start(device: &AudioDevice, output_path: PathBuf) -> Result<Self, AudioCaptureError> {
        if device.is_known_wireless() {
            std::thread::sleep(WIRELESS_SETTLE_DELAY);
        }

        match Self::open(device, output_path.clone()) {
            Ok(recorder) => Ok(recorder),
            Err(err) if !device.is_default() => {
                log::warn!("failed to open '{}' ({err}), retrying on default device", device.name);
                Self::open(&AudioDevice::default_sentinel(), output_path)
                    .map_err(|_| AudioCaptureError::DeviceUnavailable)
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_cpal_device(device: &AudioDevice) -> Result<cpal::Device, AudioCaptureError> {
        let host = cpal::default_host();
        if device.is_default() {
            return host.default_input_device().ok_or(AudioCaptureError::NoInputDevice);
        }
        for dev in host.input_devices()? {
            if dev.name().map(|n| n == device.name).unwrap_or(false) {
                return Ok(dev);
            }
        }
        host.default_input_device().ok_or(AudioCaptureError::NoInputDevice)
    }

    fn open(device: &AudioDevice, output_path: PathBuf) -> Result<Self, AudioCaptureError> {
        let cpal_device = Self::resolve_cpal_device(device)?;

        // §4.4 step 3: best-effort only, many sandboxes forbid setting the OS default.
        // cpal has no cross-platform API for this; the intent is documented here for the
        // platform layer to act on if it ever gains one.

        let default_cfg = cpal_device.default_input_config()?;
        let native_sample_rate_hz = default_cfg.sample_rate().0;

        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&output_path)?;
        let writer = BufWriter::new(file);

        let (sample_tx, sample_rx) = mpsc::channel::<Vec<f32>>();
        let (cmd_tx, cmd_rx) = mpsc::channel::<Cmd>();
        let (worker_tx, worker_rx) = mpsc::channel::<WorkerMsg>();

        let level_cb: LevelCallback = Arc::new(Mutex::new(None));
        let level_cb_worker = level_cb.clone();

        let worker_handle = std::thread::spawn(move || {
            let config = default_cfg;
            let sample_format = config.sample_format();
            let channels = config.channels() as usize;

            let stream = build_stream_for_format(&cpal_device, &config.clone().into(), sample_format, channels, sample_tx);

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = worker_tx.send(WorkerMsg::Error(format!("build stream: {e}")));
                    log::error!("Audio stream build failed: {e}");
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = worker_tx.send(WorkerMsg::Error(format!("play stream: {e}")));
                log::error!("Audio stream play failed: {e}");
                return;
            }

            let _ = worker_tx.send(WorkerMsg::Ready);

            run_consumer(sample_rx, cmd_rx, level_cb_worker, writer, native_sample_rate_hz);
            drop(stream);
        });

        match worker_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(WorkerMsg::Ready) => {}
            Ok(WorkerMsg::Error(e)) => return Err(AudioCaptureError::Worker(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => return Err(AudioCaptureError::WorkerTimeout),
            Err(_) => return Err(AudioCaptureError::Channel),
        }

        Ok(Self {
            cmd_tx,
            worker_handle: Some(worker_handle),
            handle: RecordingHandle { output_path, sample_rate_hz: TARGET_SAMPLE_RATE_HZ },
            level_cb,
        })
    }

    pub fn begin(&self) -> Result<(), AudioCaptureError> {
        self.cmd_tx.send(Cmd::Start).map_err(|_| AudioCaptureError::Channel)
    }

    /// §4.4: "flushes and closes the file, returns the handle. Idempotent."
    pub fn stop(&self) -> Result<RecordingHandle, AudioCaptureError> {
        let (resp_tx, resp_rx) = mpsc::channel();
        self.cmd_tx.send(Cmd::Stop(resp_tx)).map_err(|_| AudioCaptureError::Channel)?;

        match resp_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(result) => result.map(|_| self.handle.clone()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AudioCaptureError::StopTimeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AudioCaptureError::Channel),
        }
    }

    pub fn close(mut self) -> Result<(), AudioCaptureError> {
        let _ = self.cmd_tx.send(Cmd::Shutdown);
        if let Some(h) = self.worker_handle.take() {
            let _ = h.join();
        }
        Ok(())
    }

    /// Read back the disk-backed capture as an in-memory sample buffer, for handoff to the
    /// Speech Client.
    pub fn read_captured(handle: &RecordingHandle) -> Result<CapturedAudio, AudioCaptureError> {
        let samples = read_raw_f32_file(&handle.output_path)?;
        Ok(CapturedAudio { sample_rate_hz: handle.sample_rate_hz, samples })
    }
}

fn read_raw_f32_file(path: &Path) -> std::io::Result<Vec<f32>> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn build_stream_for_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    channels: usize,
    sample_tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError> {
    match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(device, config, channels, sample_tx),
        SampleFormat::I16 => build_input_stream::<i16>(device, config, channels, sample_tx),
        SampleFormat::U16 => build_input_stream::<u16>(device, config, channels, sample_tx),
        SampleFormat::I8 => build_input_stream::<i8>(device, config, channels, sample_tx),
        SampleFormat::U8 => build_input_stream::<u8>(device, config, channels, sample_tx),
        SampleFormat::I32 => build_input_stream::<i32>(device, config, channels, sample_tx),
        SampleFormat::U32 => build_input_stream::<u32>(device, config, channels, sample_tx),
        SampleFormat::F64 => build_input_stream::<f64>(device, config, channels, sample_tx),
        _ => build_input_stream::<f32>(device, config, channels, sample_tx),
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    sample_tx: mpsc::Sender<Vec<f32>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let output_buffer: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let out_buf = output_buffer.clone();

    let cb = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let mut buf = out_buf.lock().expect("capture buffer mutex poisoned");
        buf.clear();

        if channels == 1 {
            buf.extend(data.iter().map(|&s| s.to_sample::<f32>()));
        } else {
            for frame in data.chunks_exact(channels) {
                let mono = frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32;
                buf.push(mono);
            }
        }

        let _ = sample_tx.send(buf.clone());
    };

    device.build_input_stream(
        config,
        cb,
        |err| {
            log::error!("Audio stream error: {err}");
        },
        None,
    )
}

/// §4.4 step 5: `L = clamp((20·log10(rms) + 80) / 80, 0, 1)`.
fn normalized_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    if rms <= 0.0 {
        return 0.0;
    }
    ((20.0 * rms.log10() + 80.0) / 80.0).clamp(0.0, 1.0)
}

fn run_consumer(
    sample_rx: mpsc::Receiver<Vec<f32>>,
    cmd_rx: mpsc::Receiver<Cmd>,
    level_cb: LevelCallback,
    mut writer: BufWriter<File>,
    native_sample_rate_hz: u32,
) {
    let mut recording = false;

    loop {
        while let Ok(cmd) = cmd_rx.try_recv() {
            match cmd {
                Cmd::Start => recording = true,
                Cmd::Stop(resp) => {
                    recording = false;
                    let result = writer.flush().map_err(AudioCaptureError::Io);
                    let _ = resp.send(result);
                }
                Cmd::Shutdown => return,
            }
        }

        match sample_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(samples) => {
                if let Some(cb) = level_cb.lock().expect("level callback mutex poisoned").as_ref() {
                    cb(normalized_level(&samples));
                }
                if recording {
                    let resampled = if native_sample_rate_hz == TARGET_SAMPLE_RATE_HZ {
                        samples
                    } else {
                        resample_mono_f32(&samples, native_sample_rate_hz, TARGET_SAMPLE_RATE_HZ)
                            .unwrap_or(samples)
                    };
                    for sample in &resampled {
                        let _ = writer.write_all(&sample.to_le_bytes());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_level() {
        assert_eq!(normalized_level(&[0.0; 64]), 0.0);
    }

    #[test]
    fn full_scale_level_is_clamped_to_one() {
        let loud = vec![1.0_f32; 64];
        assert!((normalized_level(&loud) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn level_is_monotonic_in_amplitude() {
        let quiet = vec![0.01_f32; 64];
        let louder = vec![0.2_f32; 64];
        assert!(normalized_level(&quiet) < normalized_level(&louder));
    }
}
