//! Capture device boundary: chunked, blocking sample reads over cpal.
//!
//! The capture worker pulls fixed-size chunks of mono i16 samples through
//! the [`CaptureSource`] trait. The production implementation wraps a cpal
//! input stream, converting multi-channel audio to mono by averaging
//! channels and buffering callback batches so `read_chunk` can hand out
//! exact chunk lengths. Device selection and the ALSA stderr suppression
//! follow the same rules as `sigscope list-devices`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// A read that produces no samples for this long is treated as a stalled
/// device rather than a slow one.
const READ_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Failures on the capture side of the pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The input device could not be opened or configured.
    #[error("failed to open audio input: {0}")]
    DeviceOpen(String),
    /// The device runs at a different rate than the configuration asks for.
    #[error("device sample rate {actual}Hz does not match requested {requested}Hz")]
    RateMismatch { requested: u32, actual: u32 },
    /// The device's native sample format cannot be captured as 16-bit PCM.
    #[error("unsupported device sample format: {0}")]
    UnsupportedFormat(String),
    /// The stream ended before a full chunk could be assembled.
    #[error("short read from capture stream: got {got} of {want} samples")]
    ShortRead { got: usize, want: usize },
    /// The device produced no samples within the stall timeout.
    #[error("capture stream stalled: no samples for {0:?}")]
    Stalled(Duration),
    /// The stream reported a runtime error (device unplugged, server gone).
    #[error("capture stream error: {0}")]
    Stream(String),
}

/// Blocking, chunk-oriented sample producer.
///
/// One chunk read takes roughly `chunk_len / sample_rate` seconds; the
/// capture loop is paced by that latency. Closing happens on drop.
pub trait CaptureSource {
    /// The rate the device actually runs at, which may differ from the
    /// requested one. Callers decide whether a mismatch is acceptable.
    fn sample_rate(&self) -> u32;

    /// Fills `buf` with the next `buf.len()` mono samples, blocking until
    /// they are available.
    ///
    /// # Errors
    /// - [`CaptureError::ShortRead`] if the stream ended mid-chunk
    /// - [`CaptureError::Stalled`] if the device stops producing samples
    /// - [`CaptureError::Stream`] if the device reported a runtime error
    fn read_chunk(&mut self, buf: &mut [i16]) -> Result<(), CaptureError>;

    /// Stops the device from producing samples until [`resume`] is called.
    ///
    /// [`resume`]: CaptureSource::resume
    fn pause(&mut self) -> Result<(), CaptureError>;

    /// Resumes a paused device, discarding anything captured before or
    /// during the pause.
    fn resume(&mut self) -> Result<(), CaptureError>;
}

/// cpal-backed [`CaptureSource`] reading from a system input device.
pub struct CpalSource {
    stream: cpal::Stream,
    rx: Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    stream_error: Arc<Mutex<Option<String>>>,
    sample_rate: u32,
}

impl CpalSource {
    /// Opens an input device and starts its stream.
    ///
    /// `device_spec` is `"default"`, a device name, or a numeric index as
    /// printed by `sigscope list-devices`. The device is asked for
    /// `requested_rate`; if it cannot run at that rate its default rate is
    /// used instead, and [`sample_rate`] reports what was actually
    /// configured.
    ///
    /// # Errors
    /// - If no matching device exists or it cannot be configured
    /// - If the device's sample format is neither i16 nor f32
    ///
    /// [`sample_rate`]: CaptureSource::sample_rate
    pub fn open(device_spec: &str, requested_rate: u32) -> Result<Self, CaptureError> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if device_spec == "default" {
                host.default_input_device()
                    .ok_or_else(|| CaptureError::DeviceOpen("no input device available".into()))
            } else {
                find_device_by_spec(&host, device_spec)
            }
        })?;

        let device_name = device.name().unwrap_or_else(|_| "unknown device".into());
        tracing::info!("Capture device: {}", device_name);

        let default_config = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceOpen(e.to_string()))?;
        let channels = default_config.channels();
        let sample_format = default_config.sample_format();
        let sample_rate = resolve_rate(&device, &default_config, requested_rate);

        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?} samples",
            sample_rate,
            channels,
            sample_format
        );

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = std::sync::mpsc::channel::<Vec<i16>>();
        let stream_error = Arc::new(Mutex::new(None));
        let stream = build_mono_stream(&device, &config, sample_format, tx, &stream_error)?;
        stream
            .play()
            .map_err(|e| CaptureError::DeviceOpen(e.to_string()))?;

        tracing::debug!("Capture stream started");
        Ok(CpalSource {
            stream,
            rx,
            pending: VecDeque::new(),
            stream_error,
            sample_rate,
        })
    }

    fn take_stream_error(&self) -> Option<String> {
        self.stream_error.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl CaptureSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_chunk(&mut self, buf: &mut [i16]) -> Result<(), CaptureError> {
        let want = buf.len();
        while self.pending.len() < want {
            if let Some(message) = self.take_stream_error() {
                return Err(CaptureError::Stream(message));
            }
            match self.rx.recv_timeout(READ_STALL_TIMEOUT) {
                Ok(batch) => self.pending.extend(batch),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CaptureError::Stalled(READ_STALL_TIMEOUT))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::ShortRead {
                        got: self.pending.len(),
                        want,
                    })
                }
            }
        }
        for sample in buf.iter_mut() {
            *sample = self.pending.pop_front().unwrap_or(0);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), CaptureError> {
        self.stream
            .pause()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        tracing::debug!("Capture paused");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), CaptureError> {
        // Anything captured before the pause took effect is stale.
        while self.rx.try_recv().is_ok() {}
        self.pending.clear();
        self.stream
            .play()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        tracing::debug!("Capture resumed");
        Ok(())
    }
}

/// Picks the rate the stream will actually be configured with: the
/// requested rate when the device supports it, its default rate otherwise.
fn resolve_rate(
    device: &cpal::Device,
    default_config: &cpal::SupportedStreamConfig,
    requested_rate: u32,
) -> u32 {
    let default_rate = default_config.sample_rate().0;
    if default_rate == requested_rate {
        return requested_rate;
    }

    let supports_requested = device
        .supported_input_configs()
        .map(|mut ranges| {
            ranges.any(|range| {
                range.sample_format() == default_config.sample_format()
                    && range.channels() == default_config.channels()
                    && range.min_sample_rate().0 <= requested_rate
                    && requested_rate <= range.max_sample_rate().0
            })
        })
        .unwrap_or(false);

    if supports_requested {
        requested_rate
    } else {
        tracing::warn!(
            "Device cannot run at {}Hz, falling back to its default {}Hz",
            requested_rate,
            default_rate
        );
        default_rate
    }
}

/// Builds an input stream whose callback mixes down to mono i16 batches.
fn build_mono_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    tx: Sender<Vec<i16>>,
    stream_error: &Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, CaptureError> {
    let channels = config.channels as usize;
    let error_slot = Arc::clone(stream_error);
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Capture stream error: {}", err);
        if let Ok(mut slot) = error_slot.lock() {
            slot.get_or_insert_with(|| err.to_string());
        }
    };

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(mixdown_i16(data, channels));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(mixdown_f32(data, channels));
            },
            err_fn,
            None,
        ),
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.map_err(|e| CaptureError::DeviceOpen(e.to_string()))
}

/// Converts interleaved i16 frames to mono by averaging all channels.
fn mixdown_i16(data: &[i16], channels: usize) -> Vec<i16> {
    match channels {
        0 | 1 => data.to_vec(),
        _ => data
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect(),
    }
}

/// Converts interleaved f32 frames to mono i16 by averaging all channels.
fn mixdown_f32(data: &[f32], channels: usize) -> Vec<i16> {
    let channels = channels.max(1);
    data.chunks_exact(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().sum();
            let mono = (sum / channels as f32).clamp(-1.0, 1.0);
            (mono * i16::MAX as f32) as i16
        })
        .collect()
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the given name/index is found
pub fn find_device_by_spec(host: &cpal::Host, spec: &str) -> Result<cpal::Device, CaptureError> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| CaptureError::DeviceOpen(format!("failed to enumerate devices: {e}")))?
        .collect();

    if let Ok(index) = spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            CaptureError::DeviceOpen(format!(
                "device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            ))
        });
    }

    for device in devices {
        if device.name().is_ok_and(|name| name == spec) {
            return Ok(device);
        }
    }

    Err(CaptureError::DeviceOpen(format!(
        "audio input device '{spec}' not found; run 'sigscope list-devices' to see what is available"
    )))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library
/// warnings on Linux. On other platforms this is a no-op.
#[cfg(target_os = "linux")]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> Result<T, CaptureError>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| CaptureError::DeviceOpen(format!("failed to open /dev/null: {e}")))?;
    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(CaptureError::DeviceOpen(
            "failed to duplicate stderr".into(),
        ));
    }

    if unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(CaptureError::DeviceOpen("failed to redirect stderr".into()));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms no stderr suppression is needed.
#[cfg(not(target_os = "linux"))]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T, CaptureError>
where
    F: FnOnce() -> Result<T, CaptureError>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixdown_mono_passthrough() {
        assert_eq!(mixdown_i16(&[1, -2, 3], 1), vec![1, -2, 3]);
    }

    #[test]
    fn test_mixdown_stereo_averages_pairs() {
        assert_eq!(mixdown_i16(&[100, 200, -100, 100], 2), vec![150, 0]);
    }

    #[test]
    fn test_mixdown_multichannel_averages_frames() {
        assert_eq!(mixdown_i16(&[30, 60, 90, -30, -60, -90], 3), vec![60, -60]);
    }

    #[test]
    fn test_mixdown_f32_scales_to_i16() {
        let out = mixdown_f32(&[1.0, 1.0, -1.0, -1.0], 2);
        assert_eq!(out, vec![i16::MAX, -i16::MAX]);
    }
}
