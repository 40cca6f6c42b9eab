//! Error types shared across StoryReel crates.

use std::path::PathBuf;

/// Top-level error type for StoryReel operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("Alignment error: {message}")]
    Alignment { message: String },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    #[error("Silence detection error: {message}")]
    Silence { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Staging error: {message}")]
    Staging { message: String },

    #[error("Job error: {message}")]
    Job { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn alignment(msg: impl Into<String>) -> Self {
        Self::Alignment {
            message: msg.into(),
        }
    }

    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::Transcription {
            message: msg.into(),
        }
    }

    pub fn silence(msg: impl Into<String>) -> Self {
        Self::Silence {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn staging(msg: impl Into<String>) -> Self {
        Self::Staging {
            message: msg.into(),
        }
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Whether this error means the requested job id is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_message_is_preserved_in_display() {
        let err = ReelError::render("ffmpeg exited with status 1: codec missing");
        assert_eq!(
            err.to_string(),
            "Render error: ffmpeg exited with status 1: codec missing"
        );
    }

    #[test]
    fn test_not_found_detection() {
        let err = ReelError::JobNotFound {
            id: "abc".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!ReelError::job("boom").is_not_found());
    }
}
