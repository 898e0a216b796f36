//! Output sinks
//!
//! [`AudioSink`] is the seam between the playback normalizer and the sound
//! API. [`CpalSink`] is the real implementation; tests substitute stubs.

use crate::config::PlaybackConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Time left for the device to flush its own buffer after the last sample
/// has been handed over.
const DRAIN_GRACE: Duration = Duration::from_millis(150);

/// Sample formats the normalizer can hand to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    F32,
    I32,
    I16,
    I8,
    U8,
}

/// Mono samples in a concrete output format
#[derive(Debug, Clone, PartialEq)]
pub enum PcmData {
    F32(Vec<f32>),
    I32(Vec<i32>),
    I16(Vec<i16>),
    I8(Vec<i8>),
    U8(Vec<u8>),
}

impl PcmData {
    /// Convert normalized float samples into `format`, clamping to range
    pub fn from_f32(samples: &[f32], format: OutputFormat) -> Self {
        let clamped = samples.iter().map(|s| f64::from(s.clamp(-1.0, 1.0)));
        match format {
            OutputFormat::F32 => PcmData::F32(samples.to_vec()),
            OutputFormat::I32 => PcmData::I32(
                clamped
                    .map(|s| (s * 2147483648.0).round().min(2147483647.0) as i32)
                    .collect(),
            ),
            OutputFormat::I16 => PcmData::I16(
                clamped
                    .map(|s| (s * 32768.0).round().min(32767.0) as i16)
                    .collect(),
            ),
            OutputFormat::I8 => {
                PcmData::I8(clamped.map(|s| (s * 128.0).round().min(127.0) as i8).collect())
            }
            OutputFormat::U8 => PcmData::U8(
                clamped
                    .map(|s| ((s * 128.0).round().min(127.0) + 128.0) as u8)
                    .collect(),
            ),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            PcmData::F32(_) => OutputFormat::F32,
            PcmData::I32(_) => OutputFormat::I32,
            PcmData::I16(_) => OutputFormat::I16,
            PcmData::I8(_) => OutputFormat::I8,
            PcmData::U8(_) => OutputFormat::U8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PcmData::F32(v) => v.len(),
            PcmData::I32(v) => v.len(),
            PcmData::I16(v) => v.len(),
            PcmData::I8(v) => v.len(),
            PcmData::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a sink refused or failed to play
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("sample rate {0} Hz not supported")]
    UnsupportedRate(u32),

    #[error("sample format not supported (device prefers {native:?})")]
    UnsupportedFormat { native: OutputFormat },

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Something that can play mono PCM to completion
pub trait AudioSink: Send + Sync {
    /// Play `data` on `device` (or the default device) and block until done
    fn play(&self, device: Option<&str>, sample_rate: u32, data: &PcmData) -> Result<(), SinkError>;
}

impl<S: AudioSink + ?Sized> AudioSink for &S {
    fn play(&self, device: Option<&str>, sample_rate: u32, data: &PcmData) -> Result<(), SinkError> {
        (**self).play(device, sample_rate, data)
    }
}

/// Output device summary for `--list-devices`
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub channels: u16,
    pub default_sample_rate: u32,
    pub is_default: bool,
}

/// Plays through `cpal`
#[derive(Debug, Clone, Default)]
pub struct CpalSink {
    host: Option<String>,
    buffer_size: Option<u32>,
}

impl CpalSink {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            host: config.host.clone(),
            buffer_size: config.buffer_size,
        }
    }

    fn host(&self) -> cpal::Host {
        if let Some(wanted) = &self.host {
            let found = cpal::available_hosts()
                .into_iter()
                .find(|id| id.name().eq_ignore_ascii_case(wanted));
            match found.map(cpal::host_from_id) {
                Some(Ok(host)) => return host,
                Some(Err(e)) => warn!("⚠️ Audio host '{}' unavailable: {}", wanted, e),
                None => warn!("⚠️ Unknown audio host '{}', using default", wanted),
            }
        }
        cpal::default_host()
    }

    fn device(&self, host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, SinkError> {
        match name {
            None => host
                .default_output_device()
                .ok_or_else(|| SinkError::DeviceUnavailable("no default output device".into())),
            Some(wanted) => {
                let devices = host
                    .output_devices()
                    .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))?;
                let mut partial = None;
                for device in devices {
                    let Ok(device_name) = device.name() else {
                        continue;
                    };
                    if device_name == wanted {
                        return Ok(device);
                    }
                    if partial.is_none() && device_name.contains(wanted) {
                        partial = Some(device);
                    }
                }
                partial.ok_or_else(|| {
                    SinkError::DeviceUnavailable(format!("no output device named '{}'", wanted))
                })
            }
        }
    }

    /// Enumerate output devices on the configured host
    pub fn list_devices(&self) -> anyhow::Result<Vec<DeviceInfo>> {
        let host = self.host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());

        let mut infos = Vec::new();
        for device in host.output_devices()? {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            let (channels, default_sample_rate) = match device.default_output_config() {
                Ok(cfg) => (cfg.channels(), cfg.sample_rate().0),
                Err(_) => (0, 0),
            };
            infos.push(DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                channels,
                default_sample_rate,
            });
        }
        Ok(infos)
    }
}

fn to_output_format(format: cpal::SampleFormat) -> Option<OutputFormat> {
    match format {
        cpal::SampleFormat::F32 => Some(OutputFormat::F32),
        cpal::SampleFormat::I32 => Some(OutputFormat::I32),
        cpal::SampleFormat::I16 => Some(OutputFormat::I16),
        cpal::SampleFormat::I8 => Some(OutputFormat::I8),
        cpal::SampleFormat::U8 => Some(OutputFormat::U8),
        _ => None,
    }
}

/// Pick the integer format to fall back to, preferring 16-bit
fn native_integer_format(ranges: &[cpal::SupportedStreamConfigRange]) -> Option<OutputFormat> {
    let available: Vec<OutputFormat> = ranges
        .iter()
        .filter_map(|r| to_output_format(r.sample_format()))
        .collect();
    [
        OutputFormat::I16,
        OutputFormat::I32,
        OutputFormat::U8,
        OutputFormat::I8,
    ]
    .into_iter()
    .find(|f| available.contains(f))
}

enum StreamEvent {
    Drained,
    Failed(String),
}

/// Fixed buffer size clamped into what the device reports it accepts
fn buffer_size_for(requested: Option<u32>, supported: &cpal::SupportedBufferSize) -> cpal::BufferSize {
    match (requested, supported) {
        (None, _) => cpal::BufferSize::Default,
        (Some(frames), cpal::SupportedBufferSize::Range { min, max }) if min <= max => {
            let clamped = frames.clamp(*min, *max);
            if clamped != frames {
                debug!("Buffer size {} outside {}..={}, using {}", frames, min, max, clamped);
            }
            cpal::BufferSize::Fixed(clamped)
        }
        (Some(frames), cpal::SupportedBufferSize::Unknown) => cpal::BufferSize::Fixed(frames),
        (Some(_), _) => cpal::BufferSize::Default,
    }
}

fn map_build_error(err: cpal::BuildStreamError, config: &cpal::StreamConfig) -> SinkError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => {
            SinkError::DeviceUnavailable("device disappeared".into())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => SinkError::Stream(format!(
            "stream config not supported ({} Hz, {} ch, {:?} buffer)",
            config.sample_rate.0, config.channels, config.buffer_size
        )),
        other => SinkError::Stream(other.to_string()),
    }
}

/// Feed `samples` to every channel of a new stream and wait for the end
fn run_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<T>,
    silence: T,
) -> Result<(), SinkError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let err_tx = tx.clone();
    let channels = usize::from(config.channels.max(1));
    let mut position = 0usize;
    let mut drained = false;

    let stream = device
        .build_output_stream(
            config,
            move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in out.chunks_mut(channels) {
                    let sample = samples.get(position).copied().unwrap_or(silence);
                    frame.fill(sample);
                    position += 1;
                }
                if !drained && position >= samples.len() {
                    drained = true;
                    let _ = tx.send(StreamEvent::Drained);
                }
            },
            move |err| {
                let _ = err_tx.send(StreamEvent::Failed(err.to_string()));
            },
            None,
        )
        .map_err(|e| map_build_error(e, config))?;

    stream
        .play()
        .map_err(|e| SinkError::Stream(e.to_string()))?;

    match rx.recv() {
        Ok(StreamEvent::Drained) => {
            std::thread::sleep(DRAIN_GRACE);
            Ok(())
        }
        Ok(StreamEvent::Failed(msg)) => Err(SinkError::Stream(msg)),
        Err(_) => Err(SinkError::Stream("stream closed before playback finished".into())),
    }
}

impl AudioSink for CpalSink {
    fn play(&self, device: Option<&str>, sample_rate: u32, data: &PcmData) -> Result<(), SinkError> {
        let host = self.host();
        let device = self.device(&host, device)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let ranges: Vec<cpal::SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| SinkError::DeviceUnavailable(e.to_string()))?
            .collect();

        let at_rate: Vec<cpal::SupportedStreamConfigRange> = ranges
            .into_iter()
            .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
            .collect();
        if at_rate.is_empty() {
            return Err(SinkError::UnsupportedRate(sample_rate));
        }

        let wanted = data.format();
        let Some(range) = at_rate
            .iter()
            .filter(|r| to_output_format(r.sample_format()) == Some(wanted))
            .min_by_key(|r| r.channels())
        else {
            return match native_integer_format(&at_rate) {
                Some(native) if native != wanted => Err(SinkError::UnsupportedFormat { native }),
                _ => Err(SinkError::Stream(format!(
                    "no usable sample format on '{}'",
                    device_name
                ))),
            };
        };

        let config = cpal::StreamConfig {
            channels: range.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: buffer_size_for(self.buffer_size, range.buffer_size()),
        };

        info!(
            "🔊 Playing {} samples on '{}' ({} Hz, {:?}, {} ch)",
            data.len(),
            device_name,
            sample_rate,
            wanted,
            config.channels
        );

        let result = match data {
            PcmData::F32(v) => run_stream(&device, &config, v.clone(), 0.0f32),
            PcmData::I32(v) => run_stream(&device, &config, v.clone(), 0i32),
            PcmData::I16(v) => run_stream(&device, &config, v.clone(), 0i16),
            PcmData::I8(v) => run_stream(&device, &config, v.clone(), 0i8),
            PcmData::U8(v) => run_stream(&device, &config, v.clone(), 128u8),
        };
        debug!("Playback on '{}' finished: {:?}", device_name, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_integer_conversion() {
        let samples = [0.0f32, 0.5, -1.0, 1.0];
        assert_eq!(
            PcmData::from_f32(&samples, OutputFormat::I16),
            PcmData::I16(vec![0, 16384, -32768, 32767])
        );
        assert_eq!(
            PcmData::from_f32(&samples, OutputFormat::U8),
            PcmData::U8(vec![128, 192, 0, 255])
        );
        assert_eq!(
            PcmData::from_f32(&samples, OutputFormat::I8),
            PcmData::I8(vec![0, 64, -128, 127])
        );
    }

    #[test]
    fn test_from_f32_clamps_integer_overflow() {
        let data = PcmData::from_f32(&[2.0, -3.0], OutputFormat::I32);
        assert_eq!(data, PcmData::I32(vec![i32::MAX, i32::MIN]));
    }

    #[test]
    fn test_buffer_size_clamped_to_device_range() {
        let range = cpal::SupportedBufferSize::Range { min: 1024, max: 8192 };
        assert_eq!(buffer_size_for(Some(512), &range), cpal::BufferSize::Fixed(1024));
        assert_eq!(buffer_size_for(Some(2048), &range), cpal::BufferSize::Fixed(2048));
        assert_eq!(buffer_size_for(None, &range), cpal::BufferSize::Default);
        assert_eq!(
            buffer_size_for(Some(512), &cpal::SupportedBufferSize::Unknown),
            cpal::BufferSize::Fixed(512)
        );
    }

    #[test]
    fn test_rejected_config_is_not_a_rate_error() {
        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: cpal::SampleRate(22050),
            buffer_size: cpal::BufferSize::Fixed(512),
        };
        match map_build_error(cpal::BuildStreamError::StreamConfigNotSupported, &config) {
            SinkError::Stream(msg) => assert!(msg.contains("Fixed(512)"), "{}", msg),
            other => panic!("expected stream error, got {:?}", other),
        }
    }

    #[test]
    fn test_format_and_len() {
        let data = PcmData::from_f32(&[0.1, 0.2, 0.3], OutputFormat::F32);
        assert_eq!(data.format(), OutputFormat::F32);
        assert_eq!(data.len(), 3);
        assert!(!data.is_empty());
    }
}
