//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root under which each job gets a private staging directory.
    pub work_dir: PathBuf,

    /// Directory where rendered videos are written.
    pub output_dir: PathBuf,

    /// Directory holding one JSON record per render job.
    pub jobs_dir: PathBuf,

    /// Alignment heuristics.
    pub alignment: AlignmentSettings,

    /// Ordered transcription strategies.
    pub transcription: TranscriptionSettings,

    /// Voice-activity detection settings.
    pub silence: SilenceSettings,

    /// Render backend settings.
    pub render: RenderSettings,

    /// Job lifecycle settings.
    pub jobs: JobSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Tunable constants used by the alignment tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    /// Minimum share of exact token matches for a transcript window to be accepted.
    pub match_threshold: f64,

    /// Shortest duration any sentence may be given (seconds).
    pub min_sentence_secs: f64,

    /// Shortest span a transcript-matched sentence may cover (seconds).
    pub min_match_gap_secs: f64,
}

/// Transcription strategies, tried in order until one yields usable segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub strategies: Vec<TranscriptionStrategyConfig>,
}

/// One external ASR invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionStrategyConfig {
    /// Human-readable label used in logs (e.g. "whisper-base").
    pub label: String,

    /// Program to execute.
    pub program: String,

    /// Arguments. `{audio}` is replaced with the audio path and `{output}`
    /// with a scratch file the program is expected to write JSON into.
    /// Without `{output}` the JSON is read from stdout.
    #[serde(default)]
    pub args: Vec<String>,

    /// Shape of the JSON the program produces.
    #[serde(default)]
    pub format: TranscriptFormat,

    /// Seconds the program may run before it is killed and the next
    /// strategy is tried.
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_transcription_timeout_secs() -> u64 {
    600
}

/// Explicit transcript output formats understood by the transcript parsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptFormat {
    /// `{"segments":[{"start":s,"end":s,"text":"..."}]}` with seconds.
    #[default]
    Segments,
    /// whisper.cpp `-oj` output: `{"transcription":[{"offsets":{"from":ms,"to":ms},"text":"..."}]}`.
    WhisperCpp,
}

/// Silence detection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceSettings {
    /// Whether a silence detector is available to the alignment engine.
    pub enabled: bool,

    /// Level below which audio counts as silence (dB).
    pub noise_db: f64,

    /// Minimum silence length to report (seconds).
    pub min_silence_secs: f64,

    /// Seconds ffmpeg may run before detection is abandoned.
    pub timeout_secs: u64,
}

/// Which render backend drives the final video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackendKind {
    #[default]
    Ffmpeg,
    Command,
}

/// Render backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: RenderBackendKind,

    /// Program for the command backend.
    pub command_program: String,

    /// Arguments for the command backend. `{timeline}`, `{staging}` and
    /// `{output}` are substituted before execution.
    pub command_args: Vec<String>,

    /// Target video bitrate.
    pub video_bitrate_kbps: u32,

    /// Target audio bitrate.
    pub audio_bitrate_kbps: u32,

    /// Fixed closing line that plays a bundled clip instead of its image.
    pub call_to_action: Option<CallToActionConfig>,
}

/// A sentence matched by exact text that is shown with a bundled video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToActionConfig {
    pub text: String,
    pub video_path: PathBuf,
}

/// Job lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Seconds a job may sit in `processing`/`rendering` without an update
    /// before a read marks it failed.
    pub stale_timeout_secs: u64,

    /// Prefix used to turn a rendered file name into a `videoUrl`.
    /// When unset the absolute output path is reported.
    pub video_base_url: Option<String>,

    /// Listen address for the polling server.
    pub bind: String,

    /// Keep a job's staging directory after it reaches a terminal state.
    pub keep_staging: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            work_dir: std::env::temp_dir().join("storyreel").join("staging"),
            output_dir: data.join("videos"),
            jobs_dir: data.join("jobs"),
            alignment: AlignmentSettings::default(),
            transcription: TranscriptionSettings::default(),
            silence: SilenceSettings::default(),
            render: RenderSettings::default(),
            jobs: JobSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            min_sentence_secs: 0.1,
            min_match_gap_secs: 0.05,
        }
    }
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            noise_db: -35.0,
            min_silence_secs: 0.3,
            timeout_secs: 120,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: RenderBackendKind::Ffmpeg,
            command_program: String::new(),
            command_args: vec![],
            video_bitrate_kbps: 6000,
            audio_bitrate_kbps: 192,
            call_to_action: None,
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            stale_timeout_secs: 900,
            video_base_url: None,
            bind: "127.0.0.1:8087".to_string(),
            keep_staging: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}

/// Default data directory for jobs and rendered videos.
fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("storyreel")
}
