//! Render request: what a client submits to start a job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One sentence of the narration script. Its index is its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceInput {
    pub text: String,
}

impl SentenceInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Visual asset for one sentence. At most one source may be set; neither
/// means the scene falls back to a text-only card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    #[serde(default)]
    pub image_path: Option<PathBuf>,

    #[serde(default)]
    pub video_path: Option<PathBuf>,
}

impl AssetRef {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: Some(path.into()),
            video_path: None,
        }
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: None,
            video_path: Some(path.into()),
        }
    }

    /// The populated source, if any.
    pub fn source(&self) -> Option<&Path> {
        self.image_path
            .as_deref()
            .or(self.video_path.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.image_path.is_none() && self.video_path.is_none()
    }
}

/// Output shape and effect switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Portrait (short-form) output instead of landscape.
    pub is_short: bool,

    /// 24 fps instead of 30 fps.
    pub use_lower_fps: bool,

    /// Smaller variant of the selected orientation.
    pub use_lower_resolution: bool,

    /// Flag the middle scene for a glitch transition.
    pub glitch_transition: bool,
}

/// A complete render request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Ordered narration sentences.
    pub sentences: Vec<SentenceInput>,

    /// Voice-over audio track.
    pub audio_path: PathBuf,

    /// Per-sentence visuals, aligned with `sentences` by position.
    /// Missing trailing entries are treated as text-only scenes.
    #[serde(default)]
    pub assets: Vec<AssetRef>,

    #[serde(default)]
    pub options: RenderOptions,

    /// Known voice-over duration; probed from the file when absent.
    #[serde(default)]
    pub duration_secs: Option<f64>,

    /// Where the video should be written; defaults to `<output_dir>/<job id>.mp4`.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl RenderRequest {
    pub fn new(sentences: Vec<SentenceInput>, audio_path: impl Into<PathBuf>) -> Self {
        Self {
            sentences,
            audio_path: audio_path.into(),
            assets: vec![],
            options: RenderOptions::default(),
            duration_secs: None,
            output_path: None,
        }
    }

    /// Load a request manifest from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RequestError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut request: RenderRequest =
            serde_json::from_str(&json).map_err(|e| RequestError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        // Relative paths in a manifest are relative to the manifest itself.
        if let Some(base) = path.parent() {
            request.resolve_relative_to(base);
        }
        Ok(request)
    }

    /// Make every relative input path absolute against `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.audio_path);
        for asset in &mut self.assets {
            if let Some(p) = asset.image_path.as_mut() {
                resolve(p);
            }
            if let Some(p) = asset.video_path.as_mut() {
                resolve(p);
            }
        }
        if let Some(p) = self.output_path.as_mut() {
            resolve(p);
        }
    }

    /// Asset for sentence `index` (empty when not supplied).
    pub fn asset(&self, index: usize) -> AssetRef {
        self.assets.get(index).cloned().unwrap_or_default()
    }

    /// Structural checks performed before a job is created.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.sentences.is_empty() {
            return Err(RequestError::ValidationError {
                message: "at least one sentence is required".to_string(),
            });
        }
        if self.assets.len() > self.sentences.len() {
            return Err(RequestError::ValidationError {
                message: format!(
                    "{} assets supplied for {} sentences",
                    self.assets.len(),
                    self.sentences.len()
                ),
            });
        }
        if let Some(index) = self
            .assets
            .iter()
            .position(|a| a.image_path.is_some() && a.video_path.is_some())
        {
            return Err(RequestError::ValidationError {
                message: format!("asset {index} sets both an image and a video"),
            });
        }
        if let Some(duration) = self.duration_secs {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(RequestError::ValidationError {
                    message: format!("duration must be positive, got {duration}"),
                });
            }
        }
        Ok(())
    }
}

/// Errors that can occur when loading or validating a request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid request: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RenderRequest {
        RenderRequest::new(
            vec![SentenceInput::new("Hello world"), SentenceInput::new("Bye")],
            "/tmp/voice.mp3",
        )
    }

    #[test]
    fn test_valid_request_passes() {
        let mut req = request();
        req.assets = vec![AssetRef::image("/tmp/a.png")];
        assert!(req.validate().is_ok());
        assert!(req.asset(1).is_empty());
    }

    #[test]
    fn test_empty_sentences_rejected() {
        let req = RenderRequest::new(vec![], "/tmp/voice.mp3");
        assert!(matches!(
            req.validate(),
            Err(RequestError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_asset_with_both_sources_rejected() {
        let mut req = request();
        req.assets = vec![AssetRef {
            image_path: Some("a.png".into()),
            video_path: Some("a.mp4".into()),
        }];
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("asset 0"));
    }

    #[test]
    fn test_too_many_assets_rejected() {
        let mut req = request();
        req.assets = vec![AssetRef::default(); 3];
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_manifest_paths_resolve_against_manifest_dir() {
        let json = r#"{
            "sentences": [{ "text": "One" }],
            "audio_path": "voice.mp3",
            "assets": [{ "image_path": "img/one.png" }],
            "options": { "is_short": true }
        }"#;
        let mut req: RenderRequest = serde_json::from_str(json).unwrap();
        req.resolve_relative_to(Path::new("/data/job"));

        assert_eq!(req.audio_path, PathBuf::from("/data/job/voice.mp3"));
        assert_eq!(
            req.assets[0].image_path.as_deref(),
            Some(Path::new("/data/job/img/one.png"))
        );
        assert!(req.options.is_short);
        assert!(!req.options.use_lower_fps);
    }
}
