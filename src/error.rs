//! Mouth Error Types
//!
//! Centralized error handling for provisioning, synthesis and decoding.
//! Playback failures are reported as values, see `audio::PlaybackFailure`.

use thiserror::Error;

/// Central error type for Mouth
#[derive(Error, Debug)]
pub enum MouthError {
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Model discovery error: {0}")]
    ModelDiscovery(String),

    #[error("Piper failed with {status}\nStderr:\n{stderr}\nStdout:\n{stdout}")]
    Synthesis {
        status: String,
        stderr: String,
        stdout: String,
    },

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mouth operations
pub type MouthResult<T> = Result<T, MouthError>;

impl From<hound::Error> for MouthError {
    fn from(err: hound::Error) -> Self {
        MouthError::Decode(err.to_string())
    }
}

impl MouthError {
    /// Whether this error should stop the whole process rather than a
    /// single `speak` call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MouthError::Provisioning(_) | MouthError::ModelDiscovery(_) | MouthError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_error_carries_output() {
        let err = MouthError::Synthesis {
            status: "exit status: 1".to_string(),
            stderr: "model not found".to_string(),
            stdout: String::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit status: 1"));
        assert!(msg.contains("model not found"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MouthError::Provisioning("arm".into()).is_fatal());
        assert!(MouthError::ModelDiscovery("none".into()).is_fatal());
        assert!(!MouthError::Decode("bad".into()).is_fatal());
    }
}
