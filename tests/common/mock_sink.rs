//! Mock Audio Sink for Testing
//!
//! Records every playback attempt and answers from a script.

use mouth::audio::{AudioSink, OutputFormat, PcmData, SinkError};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub format: OutputFormat,
    pub samples: usize,
}

type Script = dyn Fn(&Attempt) -> Result<(), SinkError> + Send + Sync;

#[derive(Clone)]
pub struct MockSink {
    pub attempts: Arc<Mutex<Vec<Attempt>>>,
    script: Arc<Script>,
}

impl MockSink {
    pub fn accepting() -> Self {
        Self::scripted(|_| Ok(()))
    }

    /// Rejects every cell: unknown devices are unavailable, the default
    /// device refuses every rate
    pub fn rejecting() -> Self {
        Self::scripted(|a| match &a.device {
            Some(name) => Err(SinkError::DeviceUnavailable(name.clone())),
            None => Err(SinkError::UnsupportedRate(a.sample_rate)),
        })
    }

    pub fn scripted(script: impl Fn(&Attempt) -> Result<(), SinkError> + Send + Sync + 'static) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(script),
        }
    }

    pub fn get_attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }
}

impl AudioSink for MockSink {
    fn play(&self, device: Option<&str>, sample_rate: u32, data: &PcmData) -> Result<(), SinkError> {
        let attempt = Attempt {
            device: device.map(String::from),
            sample_rate,
            format: data.format(),
            samples: data.len(),
        };
        self.attempts.lock().unwrap().push(attempt.clone());
        (self.script)(&attempt)
    }
}
