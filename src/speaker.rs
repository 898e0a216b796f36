//! One `speak` call from text to sound
//!
//! Synthesizes into a WAV file, decodes it, plays it through the
//! normalizer and removes the scratch file on every exit path.

use crate::audio::{AudioBuffer, AudioSink, PlaybackFailure, PlaybackNormalizer, PlaybackReport};
use crate::config::DEFAULT_OUTPUT_FILE;
use crate::error::MouthResult;
use crate::input;
use crate::tts::Synthesizer;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What a `speak` call ended up doing
#[derive(Debug)]
pub enum SpeakOutcome {
    /// Blank input; nothing was synthesized
    Skipped,
    Played(PlaybackReport),
    /// Playback disabled; the WAV was kept at this path
    Saved(PathBuf),
    /// Synthesis worked but no device would play it
    PlaybackFailed(PlaybackFailure),
}

/// Where synthesized audio is written
#[derive(Debug, Clone)]
pub enum OutputTarget {
    /// Unique file in this directory, removed after the call
    Scratch(PathBuf),
    /// Caller-chosen file that is left in place
    Keep(PathBuf),
}

impl Default for OutputTarget {
    fn default() -> Self {
        OutputTarget::Scratch(std::env::temp_dir())
    }
}

/// A WAV path that is deleted on drop unless it was requested as output
struct ScratchFile {
    path: PathBuf,
    keep: bool,
}

impl ScratchFile {
    fn reserve(target: &OutputTarget) -> MouthResult<Self> {
        match target {
            OutputTarget::Keep(path) => Ok(Self {
                path: path.clone(),
                keep: true,
            }),
            OutputTarget::Scratch(dir) => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| anyhow::anyhow!("Time error: {}", e))?
                    .as_millis();
                let name = format!(
                    "mouth_speech_{}_{}_{}.wav",
                    std::process::id(),
                    millis,
                    SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed)
                );
                Ok(Self {
                    path: dir.join(name),
                    keep: false,
                })
            }
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

pub struct Speaker<Y: Synthesizer, S: AudioSink> {
    synthesizer: Y,
    player: Option<PlaybackNormalizer<S>>,
    output: OutputTarget,
}

impl<Y: Synthesizer, S: AudioSink> Speaker<Y, S> {
    /// `player` is `None` when audio should only be written to disk. A
    /// scratch target is then replaced by `output.wav` in the same
    /// directory, so the saved file outlives the call.
    pub fn new(synthesizer: Y, player: Option<PlaybackNormalizer<S>>, output: OutputTarget) -> Self {
        let output = match (&player, output) {
            (None, OutputTarget::Scratch(dir)) => {
                OutputTarget::Keep(dir.join(DEFAULT_OUTPUT_FILE))
            }
            (_, output) => output,
        };
        Self {
            synthesizer,
            player,
            output,
        }
    }

    /// Synthesize `text` and play it, blocking until playback ends.
    ///
    /// Blank text is a no-op. Synthesis and decode errors abort the call;
    /// playback exhaustion is logged and returned as an outcome.
    pub fn speak(&self, text: &str) -> MouthResult<SpeakOutcome> {
        let Some(text) = input::normalize(text) else {
            info!("Input text is empty. Nothing to synthesize.");
            return Ok(SpeakOutcome::Skipped);
        };

        info!("📢 Speaking: '{}'", text);
        let wav = ScratchFile::reserve(&self.output)?;
        debug!("Synthesizing into {:?}", wav.path());
        self.synthesizer.synthesize(&text, wav.path())?;

        let Some(player) = &self.player else {
            info!("💾 Speech saved to {}", wav.path().display());
            return Ok(SpeakOutcome::Saved(wav.path().to_path_buf()));
        };

        let buffer = AudioBuffer::from_wav(wav.path())?;
        match player.play(&buffer) {
            Ok(report) => Ok(SpeakOutcome::Played(report)),
            Err(failure) => {
                warn!("🔇 {}", failure);
                Ok(SpeakOutcome::PlaybackFailed(failure))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{PcmData, SinkError};
    use crate::config::PlaybackConfig;
    use crate::error::MouthError;
    use std::sync::Mutex;

    /// Writes one second of 16-bit mono silence at 22050 Hz
    #[derive(Default)]
    struct SilentSynth {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Synthesizer for SilentSynth {
        fn synthesize(&self, text: &str, output: &Path) -> MouthResult<()> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(MouthError::Synthesis {
                    status: "exit status: 1".into(),
                    stderr: "boom".into(),
                    stdout: String::new(),
                });
            }
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: 22050,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(output, spec).unwrap();
            for _ in 0..22050 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(u32, usize)>>,
        reject_all: bool,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, _device: Option<&str>, rate: u32, data: &PcmData) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push((rate, data.len()));
            if self.reject_all {
                Err(SinkError::UnsupportedRate(rate))
            } else {
                Ok(())
            }
        }
    }

    fn speaker<'a>(
        synth: &'a SilentSynth,
        sink: &'a RecordingSink,
        dir: &Path,
    ) -> Speaker<&'a SilentSynth, &'a RecordingSink> {
        Speaker::new(
            synth,
            Some(PlaybackNormalizer::new(sink, PlaybackConfig::default())),
            OutputTarget::Scratch(dir.to_path_buf()),
        )
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_blank_text_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, sink) = (SilentSynth::default(), RecordingSink::default());
        let speaker = speaker(&synth, &sink, dir.path());

        for text in ["", "   ", "\n\t"] {
            assert!(matches!(speaker.speak(text).unwrap(), SpeakOutcome::Skipped));
        }
        assert!(synth.calls.lock().unwrap().is_empty());
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_plays_and_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, sink) = (SilentSynth::default(), RecordingSink::default());
        let speaker = speaker(&synth, &sink, dir.path());

        let report = match speaker.speak("  Hello there!  ").unwrap() {
            SpeakOutcome::Played(report) => report,
            other => panic!("expected playback, got {:?}", other),
        };
        assert_eq!(report.target.sample_rate, 22050);
        assert_eq!(*sink.calls.lock().unwrap(), vec![(22050, 22050)]);
        assert_eq!(*synth.calls.lock().unwrap(), vec!["Hello there!".to_string()]);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_synthesis_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SilentSynth {
            fail: true,
            ..SilentSynth::default()
        };
        let sink = RecordingSink::default();
        let speaker = speaker(&synth, &sink, dir.path());

        let err = speaker.speak("Hello").unwrap_err();
        assert!(matches!(err, MouthError::Synthesis { .. }));
        assert!(sink.calls.lock().unwrap().is_empty());
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_playback_failure_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SilentSynth::default();
        let sink = RecordingSink {
            reject_all: true,
            ..RecordingSink::default()
        };
        let speaker = speaker(&synth, &sink, dir.path());

        let outcome = speaker.speak("Hello").unwrap();
        assert!(matches!(outcome, SpeakOutcome::PlaybackFailed(_)));
        assert_eq!(sink.calls.lock().unwrap().len(), 4);
        assert!(dir_is_empty(dir.path()));
    }

    #[test]
    fn test_keep_output_without_playback() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output.wav");
        let synth = SilentSynth::default();
        let speaker: Speaker<_, RecordingSink> =
            Speaker::new(&synth, None, OutputTarget::Keep(out.clone()));

        let outcome = speaker.speak("Hello").unwrap();
        assert!(matches!(outcome, SpeakOutcome::Saved(ref p) if *p == out));
        assert!(out.exists());
    }

    #[test]
    fn test_saved_scratch_output_survives_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SilentSynth::default();
        let speaker: Speaker<_, RecordingSink> =
            Speaker::new(&synth, None, OutputTarget::Scratch(dir.path().to_path_buf()));

        let path = match speaker.speak("Hello").unwrap() {
            SpeakOutcome::Saved(path) => path,
            other => panic!("expected a saved file, got {:?}", other),
        };
        assert_eq!(path, dir.path().join("output.wav"));
        assert!(path.exists());
        assert_eq!(AudioBuffer::from_wav(&path).unwrap().frame_count(), 22050);
    }
}
