//! PCM buffers and the pure sample transforms applied before playback

use crate::error::{MouthError, MouthResult};
use std::path::Path;
use tracing::debug;

/// Bytes per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    One,
    Two,
    Four,
}

impl SampleWidth {
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    /// Value that maps to 1.0 when converting integer samples to float
    pub fn full_scale(self) -> f64 {
        match self {
            Self::One => 128.0,
            Self::Two => 32768.0,
            Self::Four => 2147483648.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Integer,
    Float,
}

/// Raw interleaved little-endian PCM with its declared format.
///
/// 8-bit integer audio is unsigned with a bias of 128, as in WAV files.
/// Float audio is always 4 bytes wide.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Vec<u8>,
    sample_rate: u32,
    channel_count: u16,
    sample_width: SampleWidth,
    encoding: SampleEncoding,
}

impl AudioBuffer {
    pub fn from_raw(
        data: Vec<u8>,
        sample_width: SampleWidth,
        channel_count: u16,
        sample_rate: u32,
        encoding: SampleEncoding,
    ) -> MouthResult<Self> {
        if sample_rate == 0 {
            return Err(MouthError::Decode("sample rate must be positive".into()));
        }
        if !(1..=2).contains(&channel_count) {
            return Err(MouthError::Decode(format!(
                "unsupported channel count {} (expected 1 or 2)",
                channel_count
            )));
        }
        if encoding == SampleEncoding::Float && sample_width != SampleWidth::Four {
            return Err(MouthError::Decode(format!(
                "float samples must be 4 bytes wide, got {}",
                sample_width.bytes()
            )));
        }
        if data.len() % sample_width.bytes() != 0 {
            return Err(MouthError::Decode(format!(
                "{} bytes is not a whole number of {}-byte samples",
                data.len(),
                sample_width.bytes()
            )));
        }

        Ok(Self {
            data,
            sample_rate,
            channel_count,
            sample_width,
            encoding,
        })
    }

    /// Read a WAV file produced by the synthesizer
    pub fn from_wav(path: &Path) -> MouthResult<Self> {
        let reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        debug!(
            "WAV {:?}: {} Hz, {} ch, {} bit {:?}",
            path, spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );

        let width = SampleWidth::from_bytes(usize::from(spec.bits_per_sample / 8))
            .filter(|_| spec.bits_per_sample % 8 == 0)
            .ok_or_else(|| {
                MouthError::Decode(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                ))
            })?;

        let mut data = Vec::with_capacity(reader.len() as usize * width.bytes());
        let encoding = match spec.sample_format {
            hound::SampleFormat::Float => {
                for sample in reader.into_samples::<f32>() {
                    data.extend_from_slice(&sample?.to_le_bytes());
                }
                SampleEncoding::Float
            }
            hound::SampleFormat::Int => {
                match width {
                    // hound hands out 8-bit samples already centred on zero
                    SampleWidth::One => {
                        for sample in reader.into_samples::<i8>() {
                            data.push((i16::from(sample?) + 128) as u8);
                        }
                    }
                    SampleWidth::Two => {
                        for sample in reader.into_samples::<i16>() {
                            data.extend_from_slice(&sample?.to_le_bytes());
                        }
                    }
                    SampleWidth::Four => {
                        for sample in reader.into_samples::<i32>() {
                            data.extend_from_slice(&sample?.to_le_bytes());
                        }
                    }
                }
                SampleEncoding::Integer
            }
        };

        Self::from_raw(data, width, spec.channels, spec.sample_rate, encoding)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_width(&self) -> SampleWidth {
        self.sample_width
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.sample_width.bytes() / usize::from(self.channel_count)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Interleaved samples scaled to floating point
    pub fn to_f32(&self) -> Vec<f32> {
        decode_samples(&self.data, self.sample_width, self.encoding)
    }
}

/// Convert little-endian PCM bytes to floats, dividing by the full-scale value
pub fn decode_samples(data: &[u8], width: SampleWidth, encoding: SampleEncoding) -> Vec<f32> {
    let scale = width.full_scale();
    match (encoding, width) {
        (SampleEncoding::Float, _) => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        (SampleEncoding::Integer, SampleWidth::One) => data
            .iter()
            .map(|&b| ((f64::from(b) - 128.0) / scale) as f32)
            .collect(),
        (SampleEncoding::Integer, SampleWidth::Two) => data
            .chunks_exact(2)
            .map(|c| (f64::from(i16::from_le_bytes([c[0], c[1]])) / scale) as f32)
            .collect(),
        (SampleEncoding::Integer, SampleWidth::Four) => data
            .chunks_exact(4)
            .map(|c| (f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])) / scale) as f32)
            .collect(),
    }
}

/// Inverse of [`decode_samples`] for integer PCM. Values are clamped to the
/// representable range.
pub fn encode_samples(samples: &[f32], width: SampleWidth) -> Vec<u8> {
    let scale = width.full_scale();
    let mut out = Vec::with_capacity(samples.len() * width.bytes());
    for &s in samples {
        let v = (f64::from(s) * scale).round();
        match width {
            SampleWidth::One => out.push((v.clamp(-128.0, 127.0) + 128.0) as u8),
            SampleWidth::Two => {
                out.extend_from_slice(&(v.clamp(-32768.0, 32767.0) as i16).to_le_bytes())
            }
            SampleWidth::Four => out.extend_from_slice(
                &(v.clamp(-2147483648.0, 2147483647.0) as i32).to_le_bytes(),
            ),
        }
    }
    out
}

/// Average stereo frame pairs down to mono. Mono input is returned as is.
pub fn collapse_to_mono(samples: Vec<f32>, channel_count: u16) -> Vec<f32> {
    if channel_count != 2 {
        return samples;
    }
    samples
        .chunks_exact(2)
        .map(|frame| (frame[0] + frame[1]) / 2.0)
        .collect()
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Scale the buffer down so its peak is 1.0 when it would otherwise clip
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = peak(samples);
    if peak > 1.0 {
        debug!("Normalizing buffer with peak {:.3}", peak);
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// Linear interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let new_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..new_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}
