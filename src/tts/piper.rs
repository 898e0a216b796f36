//! Piper TTS backend calling a local binary

use super::{join_error, Synthesizer, TtsEngine};
use crate::audio::{AudioSink, CpalSink, PlaybackNormalizer};
use crate::config::{Config, DEFAULT_OUTPUT_FILE};
use crate::error::{MouthError, MouthResult};
use crate::models::VoiceFiles;
use crate::speaker::{OutputTarget, SpeakOutcome, Speaker};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs `piper --model M --config C --output_file F` with text on stdin
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    binary: PathBuf,
    voice: VoiceFiles,
}

impl PiperSynthesizer {
    pub fn new(binary: PathBuf, voice: VoiceFiles) -> Self {
        Self { binary, voice }
    }

    pub fn voice(&self) -> &VoiceFiles {
        &self.voice
    }

    fn command(&self, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model")
            .arg(&self.voice.model)
            .arg("--config")
            .arg(&self.voice.config)
            .arg("--output_file")
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Synthesizer for PiperSynthesizer {
    fn synthesize(&self, text: &str, output: &Path) -> MouthResult<()> {
        debug!(
            "Running Piper: {} --model {} --config {} --output_file {}",
            self.binary.display(),
            self.voice.model.display(),
            self.voice.config.display(),
            output.display()
        );

        let mut child = self.command(output).spawn().map_err(|e| {
            error!("❌ Failed to spawn {}: {}", self.binary.display(), e);
            MouthError::Provisioning(format!(
                "Failed to spawn {}: {}",
                self.binary.display(),
                e
            ))
        })?;

        // stdin is fed while the output pipes drain; Piper may exit early
        let stdin = child.stdin.take();
        let (written, result) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || -> std::io::Result<()> {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(text.as_bytes())?;
                    stdin.flush()?;
                }
                Ok(())
            });
            let result = child.wait_with_output();
            (writer.join(), result)
        });
        let result = result?;
        let written = written
            .map_err(|_| MouthError::Other(anyhow::anyhow!("Piper stdin writer panicked")))?;

        let stdout = String::from_utf8_lossy(&result.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();

        if !result.status.success() {
            error!("❌ Piper failed with {}", result.status);
            return Err(MouthError::Synthesis {
                status: result.status.to_string(),
                stderr,
                stdout,
            });
        }
        if let Err(e) = written {
            error!("❌ Piper exited before reading all input: {}", e);
            return Err(MouthError::Synthesis {
                status: result.status.to_string(),
                stderr: format!("failed to write text to Piper: {}\n{}", e, stderr),
                stdout,
            });
        }
        if !stdout.trim().is_empty() {
            debug!("Piper output (stdout):\n{}", stdout.trim_end());
        }

        if !output.exists() {
            return Err(MouthError::Synthesis {
                status: result.status.to_string(),
                stderr: format!("output file {} was not created\n{}", output.display(), stderr),
                stdout,
            });
        }

        Ok(())
    }
}

/// Async engine running a [`Speaker`] on the blocking thread pool
pub struct BlockingEngine<Y: Synthesizer, S: AudioSink> {
    name: String,
    speaker: Arc<Speaker<Y, S>>,
}

impl<Y: Synthesizer, S: AudioSink> BlockingEngine<Y, S> {
    pub fn new(name: impl Into<String>, speaker: Speaker<Y, S>) -> Self {
        Self {
            name: name.into(),
            speaker: Arc::new(speaker),
        }
    }
}

pub type PiperEngine = BlockingEngine<PiperSynthesizer, CpalSink>;

impl PiperEngine {
    /// Wire up Piper, the cpal sink and the configured output target
    pub fn from_config(config: &Config, binary: PathBuf, voice: VoiceFiles) -> Self {
        let synthesizer = PiperSynthesizer::new(binary, voice);
        let player = config.play_audio.then(|| {
            PlaybackNormalizer::new(CpalSink::new(&config.playback), config.playback.clone())
        });
        let output = match &config.output_file {
            Some(path) => OutputTarget::Keep(PathBuf::from(path)),
            None if !config.play_audio => OutputTarget::Keep(PathBuf::from(DEFAULT_OUTPUT_FILE)),
            None => OutputTarget::default(),
        };
        info!(
            "🛠️ Piper engine ready (voice: {})",
            synthesizer.voice().model.display()
        );
        Self::new("piper", Speaker::new(synthesizer, player, output))
    }
}

#[async_trait]
impl<Y, S> TtsEngine for BlockingEngine<Y, S>
where
    Y: Synthesizer + 'static,
    S: AudioSink + 'static,
{
    async fn speak(&self, text: &str) -> MouthResult<SpeakOutcome> {
        let speaker = Arc::clone(&self.speaker);
        let text = text.to_string();

        // Move blocking subprocess and playback work off the runtime
        tokio::task::spawn_blocking(move || speaker.speak(&text))
            .await
            .map_err(join_error)?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
