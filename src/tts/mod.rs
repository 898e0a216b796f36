//! TTS (Text-to-Speech) Module
//!
//! `Synthesizer` turns text into a WAV file; `TtsEngine` is the async face
//! the CLI talks to.

use crate::error::{MouthError, MouthResult};
use crate::speaker::SpeakOutcome;
use async_trait::async_trait;
use std::path::Path;

pub mod piper;

pub use piper::{PiperEngine, PiperSynthesizer};

/// Produces a WAV file for `text` at `output`, blocking until done
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, output: &Path) -> MouthResult<()>;
}

impl<Y: Synthesizer + ?Sized> Synthesizer for &Y {
    fn synthesize(&self, text: &str, output: &Path) -> MouthResult<()> {
        (**self).synthesize(text, output)
    }
}

/// Trait for TTS engines
#[async_trait]
pub trait TtsEngine: Send + Sync {
    /// Speak the given text
    async fn speak(&self, text: &str) -> MouthResult<SpeakOutcome>;

    /// Get the engine name
    fn name(&self) -> &str;
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> MouthError {
    MouthError::Other(anyhow::anyhow!("Task join error: {}", err))
}
