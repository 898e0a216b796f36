//! Mouth Library
//!
//! Piper text-to-speech with a playback path that falls back across
//! sample rates, sample formats and output devices.

pub mod audio;
pub mod config;
pub mod error;
pub mod fallback;
pub mod input;
pub mod models;
pub mod platform;
pub mod provision;
pub mod speaker;
pub mod tts;
