use crate::error::{MouthError, MouthResult};
use crate::platform::HostProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sample rates tried after the declared one, in order
pub const DEFAULT_FALLBACK_RATES: [u32; 4] = [48000, 44100, 22050, 16000];

/// Frames per callback on a Raspberry Pi
pub const PI_BUFFER_SIZE: u32 = 512;

/// Where audio goes when it is saved rather than played
pub const DEFAULT_OUTPUT_FILE: &str = "output.wav";

/// Playback settings handed to the normalizer and the cpal sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub fallback_rates: Vec<u32>,
    /// Output device names tried after the default device
    pub devices: Vec<String>,
    /// Fixed frames per callback; `None` lets the backend choose
    pub buffer_size: Option<u32>,
    /// cpal host name, e.g. "ALSA" or "JACK"
    pub host: Option<String>,
    /// Adjust the settings above for the detected hardware
    pub auto_tune: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fallback_rates: DEFAULT_FALLBACK_RATES.to_vec(),
            devices: Vec::new(),
            buffer_size: None,
            host: None,
            auto_tune: true,
        }
    }
}

impl PlaybackConfig {
    /// Apply hardware-specific defaults. Explicit settings win.
    pub fn tune_for(&mut self, profile: &HostProfile) {
        if !self.auto_tune {
            return;
        }
        if let HostProfile::RaspberryPi { model } = profile {
            tracing::info!("🍓 Tuning playback for {}", model);
            if self.buffer_size.is_none() {
                self.buffer_size = Some(PI_BUFFER_SIZE);
            }
            // most Piper voices are 22050 Hz
            if let Some(idx) = self.fallback_rates.iter().position(|&r| r == 22050) {
                let rate = self.fallback_rates.remove(idx);
                self.fallback_rates.insert(0, rate);
            }
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Piper binary
    pub piper_dir: String,
    pub piper_version: String,
    pub release_base_url: String,

    // Voice
    pub models_dir: String,
    pub model: Option<String>,
    pub model_config: Option<String>,

    // Output
    pub output_file: Option<String>,
    pub play_audio: bool,

    // Meta
    pub log_level: String,

    pub playback: PlaybackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            piper_dir: "piper".to_string(),
            piper_version: crate::provision::DEFAULT_PIPER_VERSION.to_string(),
            release_base_url: crate::provision::DEFAULT_RELEASE_BASE_URL.to_string(),
            models_dir: ".".to_string(),
            model: None,
            model_config: None,
            output_file: None,
            play_audio: true,
            log_level: "INFO".to_string(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create default
    pub fn load() -> MouthResult<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from `path`. A missing file yields defaults; a corrupt
    /// one is moved aside and defaults are used.
    pub fn load_from(path: &Path) -> MouthResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> MouthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> MouthResult<()> {
        if self.piper_dir.trim().is_empty() {
            return Err(MouthError::Config("piper_dir must not be empty".into()));
        }
        if self.playback.fallback_rates.contains(&0) {
            return Err(MouthError::Config("fallback rates must be positive".into()));
        }
        if self.playback.buffer_size == Some(0) {
            return Err(MouthError::Config("buffer_size must be positive".into()));
        }
        Ok(())
    }
}

/// `MOUTH_CONFIG`, or `<config dir>/mouth/config.json`
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("MOUTH_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mouth")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.piper_dir, "piper");
        assert_eq!(config.piper_version, "2023.11.14-2");
        assert!(config.play_audio);
        assert_eq!(
            config.playback.fallback_rates,
            vec![48000, 44100, 22050, 16000]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "models_dir": "/opt/voices", "playback": { "devices": ["pulse"] } }"#;
        let config: Config = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(config.models_dir, "/opt/voices");
        assert_eq!(config.piper_dir, "piper");
        assert_eq!(config.playback.devices, vec!["pulse".to_string()]);
        assert_eq!(config.playback.fallback_rates.len(), 4);
    }

    #[test]
    fn test_corrupt_config_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(!path.exists());
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let mut config = Config::default();
        config.playback.devices = vec!["hw:0".into()];
        config.save_to(&path).unwrap();

        let restored = Config::load_from(&path).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = Config::default();
        config.playback.fallback_rates.push(0);
        assert!(matches!(config.validate(), Err(MouthError::Config(_))));
    }

    #[test]
    fn test_pi_tuning() {
        let mut playback = PlaybackConfig::default();
        playback.tune_for(&HostProfile::RaspberryPi {
            model: "Raspberry Pi 4 Model B".into(),
        });
        assert_eq!(playback.buffer_size, Some(PI_BUFFER_SIZE));
        assert_eq!(playback.fallback_rates, vec![22050, 48000, 44100, 16000]);

        let mut desktop = PlaybackConfig::default();
        desktop.tune_for(&HostProfile::Desktop);
        assert_eq!(desktop, PlaybackConfig::default());
    }

    #[test]
    fn test_tuning_respects_explicit_buffer() {
        let mut playback = PlaybackConfig {
            buffer_size: Some(2048),
            ..PlaybackConfig::default()
        };
        playback.tune_for(&HostProfile::RaspberryPi { model: "Pi".into() });
        assert_eq!(playback.buffer_size, Some(2048));
    }
}
