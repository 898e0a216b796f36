//! Audio Module
//!
//! Decoding synthesizer output and playing it back:
//! - buffer: PCM decoding, mono collapse, peak normalization, resampling
//! - sink: the output seam and its cpal implementation
//! - player: the fallback-matrix playback normalizer

pub mod buffer;
pub mod player;
pub mod sink;

pub use buffer::{AudioBuffer, SampleEncoding, SampleWidth};
pub use player::{PlaybackFailure, PlaybackNormalizer, PlaybackReport, PlaybackTarget};
pub use sink::{AudioSink, CpalSink, DeviceInfo, OutputFormat, PcmData, SinkError};
