//! Mock Synthesizer for Testing
//!
//! Records every request and writes a fixed WAV instead of running Piper.

use mouth::error::{MouthError, MouthResult};
use mouth::tts::Synthesizer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct MockSynth {
    /// All text that was synthesized
    pub spoken: Arc<Mutex<Vec<String>>>,
    /// Every output path written
    pub outputs: Arc<Mutex<Vec<PathBuf>>>,
    /// Simulate a Piper failure
    pub should_fail: Arc<Mutex<bool>>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
}

impl MockSynth {
    /// One second of 16-bit mono silence at 22050 Hz
    pub fn new() -> Self {
        Self::with_format(22050, 1, 22050)
    }

    pub fn with_format(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            outputs: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            sample_rate,
            channels,
            frames,
        }
    }

    pub fn get_spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn last_output(&self) -> Option<PathBuf> {
        self.outputs.lock().unwrap().last().cloned()
    }
}

impl Default for MockSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for MockSynth {
    fn synthesize(&self, text: &str, output: &Path) -> MouthResult<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.outputs.lock().unwrap().push(output.to_path_buf());
        if *self.should_fail.lock().unwrap() {
            return Err(MouthError::Synthesis {
                status: "exit status: 1".to_string(),
                stderr: "Mock Piper failure".to_string(),
                stdout: String::new(),
            });
        }
        let samples = vec![0i16; self.frames * usize::from(self.channels)];
        super::write_wav(output, self.sample_rate, self.channels, &samples);
        Ok(())
    }
}
