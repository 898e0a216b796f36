//! Playback normalizer
//!
//! Turns a decoded [`AudioBuffer`] into sound, walking the fallback matrix
//! of devices and sample rates until one attempt succeeds.

use super::buffer::{collapse_to_mono, normalize_peak, resample_linear, AudioBuffer};
use super::sink::{AudioSink, OutputFormat, PcmData, SinkError};
use crate::config::PlaybackConfig;
use crate::fallback::{first_success, Exhausted};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// One cell of the fallback matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    /// `None` is the host's default output device
    pub device: Option<String>,
    pub sample_rate: u32,
}

impl fmt::Display for PlaybackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} Hz",
            self.device.as_deref().unwrap_or("default"),
            self.sample_rate
        )
    }
}

/// What finally played
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackReport {
    pub target: PlaybackTarget,
    pub format: OutputFormat,
    /// Calls made to the sink, including the successful one
    pub attempts: usize,
}

/// Every cell of the matrix was tried without success
#[derive(Debug, Clone)]
pub struct PlaybackFailure {
    pub exhausted: Exhausted<PlaybackTarget, SinkError>,
}

impl fmt::Display for PlaybackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exhausted.is_empty() {
            return write!(f, "no playback targets configured");
        }
        write!(f, "playback failed on every target")?;
        for attempt in &self.exhausted.attempts {
            write!(f, "\n  - {}: {}", attempt.candidate, attempt.error)?;
        }
        Ok(())
    }
}

/// Decode, collapse to mono and scale a buffer into [-1, 1]
pub fn prepare_samples(buffer: &AudioBuffer) -> Vec<f32> {
    let mut samples = collapse_to_mono(buffer.to_f32(), buffer.channel_count());
    normalize_peak(&mut samples);
    samples
}

pub struct PlaybackNormalizer<S: AudioSink> {
    sink: S,
    config: PlaybackConfig,
}

impl<S: AudioSink> PlaybackNormalizer<S> {
    pub fn new(sink: S, config: PlaybackConfig) -> Self {
        Self { sink, config }
    }

    /// Ordered (device, rate) pairs for a buffer declared at `declared_rate`.
    ///
    /// The default device comes first, then configured devices. On each
    /// device the declared rate is tried before the fallback rates; a rate
    /// is never repeated on the same device.
    pub fn matrix(&self, declared_rate: u32) -> Vec<PlaybackTarget> {
        let mut rates = vec![declared_rate];
        for &rate in &self.config.fallback_rates {
            if rate > 0 && !rates.contains(&rate) {
                rates.push(rate);
            }
        }

        let mut devices: Vec<Option<String>> = vec![None];
        for name in &self.config.devices {
            let candidate = Some(name.clone());
            if !devices.contains(&candidate) {
                devices.push(candidate);
            }
        }

        devices
            .into_iter()
            .flat_map(|device| {
                rates.iter().map(move |&sample_rate| PlaybackTarget {
                    device: device.clone(),
                    sample_rate,
                })
            })
            .collect()
    }

    /// Play a buffer to completion, or report why nothing could play
    pub fn play(&self, buffer: &AudioBuffer) -> Result<PlaybackReport, PlaybackFailure> {
        debug!(
            "Preparing {:.2}s of audio ({} Hz, {} ch, {:?} {:?})",
            buffer.duration_secs(),
            buffer.sample_rate(),
            buffer.channel_count(),
            buffer.sample_width(),
            buffer.encoding()
        );
        self.play_samples(&prepare_samples(buffer), buffer.sample_rate())
    }

    /// Play mono samples already scaled to [-1, 1]
    pub fn play_samples(
        &self,
        samples: &[f32],
        declared_rate: u32,
    ) -> Result<PlaybackReport, PlaybackFailure> {
        let mut resampled: HashMap<u32, Vec<f32>> = HashMap::new();
        let mut calls = 0usize;

        let result = first_success(self.matrix(declared_rate), |target| {
            let rate = target.sample_rate;
            let at_rate = resampled
                .entry(rate)
                .or_insert_with(|| resample_linear(samples, declared_rate, rate));

            let data = PcmData::from_f32(at_rate, OutputFormat::F32);
            calls += 1;
            let outcome = match self.sink.play(target.device.as_deref(), rate, &data) {
                Ok(()) => Ok(OutputFormat::F32),
                Err(SinkError::UnsupportedFormat { native }) => {
                    debug!("Format rejected on {}, retrying as {:?}", target, native);
                    let converted = PcmData::from_f32(at_rate, native);
                    calls += 1;
                    self.sink
                        .play(target.device.as_deref(), rate, &converted)
                        .map(|()| native)
                }
                Err(e) => Err(e),
            };

            outcome
                .inspect_err(|e| warn!("⚠️ Playback attempt on {} failed: {}", target, e))
                .map(|format| (target.clone(), format))
        });

        match result {
            Ok((target, format)) => {
                info!("✅ Played on {} as {:?}", target, format);
                Ok(PlaybackReport {
                    target,
                    format,
                    attempts: calls,
                })
            }
            Err(exhausted) => Err(PlaybackFailure { exhausted }),
        }
    }
}
