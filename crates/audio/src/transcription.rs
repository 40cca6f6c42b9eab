//! Speech-to-text collaborators.
//!
//! Each strategy runs an external ASR program and parses its output with the
//! parser for the format it was configured with. A payload that does not have
//! the expected shape becomes [`Transcript::Unusable`] instead of an error, so
//! the alignment engine only ever sees "segments" or "nothing usable".

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use storyreel_common::config::{TranscriptFormat, TranscriptionStrategyConfig};
use storyreel_common::error::{ReelError, ReelResult};

/// A single transcribed segment with timing.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionSegment {
    /// Start time in seconds.
    pub start_secs: f64,
    /// End time in seconds.
    pub end_secs: f64,
    /// Transcribed text.
    pub text: String,
}

impl TranscriptionSegment {
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            text: text.into(),
        }
    }

    fn is_usable(&self) -> bool {
        self.start_secs.is_finite()
            && self.end_secs.is_finite()
            && self.start_secs >= 0.0
            && self.end_secs >= self.start_secs
            && !self.text.trim().is_empty()
    }
}

/// Outcome of a transcription attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcript {
    /// At least one segment with text and sane timing.
    Usable(Vec<TranscriptionSegment>),
    /// The program ran but produced nothing the aligner can use.
    Unusable(String),
}

impl Transcript {
    /// Keep only sane segments, ordered by start time.
    pub fn from_segments(segments: Vec<TranscriptionSegment>) -> Self {
        let total = segments.len();
        let mut usable: Vec<_> = segments.into_iter().filter(|s| s.is_usable()).collect();
        if usable.is_empty() {
            return Transcript::Unusable(format!("none of {total} segments carried usable text"));
        }
        usable.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
        Transcript::Usable(usable)
    }

    pub fn segments(&self) -> &[TranscriptionSegment] {
        match self {
            Transcript::Usable(segments) => segments,
            Transcript::Unusable(_) => &[],
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Transcript::Usable(_))
    }
}

/// A source of timed transcript segments.
#[async_trait::async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe the audio file.
    async fn transcribe(&self, audio_path: &Path) -> ReelResult<Transcript>;

    /// Label used in logs.
    fn label(&self) -> &str;
}

#[derive(Deserialize)]
struct SegmentsPayload {
    segments: Vec<RawSegment>,
}

#[derive(Deserialize)]
struct RawSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Deserialize)]
struct WhisperCppPayload {
    transcription: Vec<WhisperCppEntry>,
}

#[derive(Deserialize)]
struct WhisperCppEntry {
    offsets: WhisperCppOffsets,
    text: String,
}

#[derive(Deserialize)]
struct WhisperCppOffsets {
    from: i64,
    to: i64,
}

/// Parse ASR output in the given format.
pub fn parse_transcript(json: &str, format: TranscriptFormat) -> Transcript {
    match format {
        TranscriptFormat::Segments => match serde_json::from_str::<SegmentsPayload>(json) {
            Ok(payload) => Transcript::from_segments(
                payload
                    .segments
                    .into_iter()
                    .map(|s| TranscriptionSegment::new(s.start, s.end, s.text))
                    .collect(),
            ),
            Err(e) => Transcript::Unusable(format!("expected a segments payload: {e}")),
        },
        TranscriptFormat::WhisperCpp => match serde_json::from_str::<WhisperCppPayload>(json) {
            Ok(payload) => Transcript::from_segments(
                payload
                    .transcription
                    .into_iter()
                    .map(|entry| {
                        TranscriptionSegment::new(
                            entry.offsets.from as f64 / 1000.0,
                            entry.offsets.to as f64 / 1000.0,
                            entry.text,
                        )
                    })
                    .collect(),
            ),
            Err(e) => Transcript::Unusable(format!("expected a whisper.cpp payload: {e}")),
        },
    }
}

/// Runs an external ASR program configured as a transcription strategy.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    config: TranscriptionStrategyConfig,
}

impl CommandTranscriber {
    pub fn new(config: TranscriptionStrategyConfig) -> Self {
        Self { config }
    }

    fn wants_output_file(&self) -> bool {
        self.config.args.iter().any(|a| a.contains("{output}"))
    }

    fn build_args(&self, audio_path: &Path, output_path: &Path) -> Vec<String> {
        let audio = audio_path.to_string_lossy();
        let output = output_path.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{audio}", &audio).replace("{output}", &output))
            .collect()
    }

    /// Scratch file next to the (job-private) audio copy.
    fn scratch_path(&self, audio_path: &Path) -> PathBuf {
        let label: String = self
            .config
            .label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        audio_path.with_extension(format!("{label}.transcript.json"))
    }
}

#[async_trait::async_trait]
impl TranscriptionClient for CommandTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> ReelResult<Transcript> {
        if !audio_path.exists() {
            return Err(ReelError::FileNotFound {
                path: audio_path.to_path_buf(),
            });
        }

        let scratch = self.scratch_path(audio_path);
        let args = self.build_args(audio_path, &scratch);
        tracing::info!(
            strategy = %self.config.label,
            program = %self.config.program,
            path = %audio_path.display(),
            "Starting transcription"
        );
        tracing::debug!(?args, "Transcriber arguments");

        let limit = Duration::from_secs(self.config.timeout_secs);
        let run = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(limit, run)
            .await
            .map_err(|_| {
                ReelError::transcription(format!(
                    "{} timed out after {}s",
                    self.config.label, self.config.timeout_secs
                ))
            })?
            .map_err(|e| {
                ReelError::transcription(format!(
                    "failed to start {} ({}): {e}",
                    self.config.program, self.config.label
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelError::transcription(format!(
                "{} exited with {}: {}",
                self.config.label,
                output.status,
                stderr.trim()
            )));
        }

        let json = if self.wants_output_file() {
            let content = tokio::fs::read_to_string(&scratch).await.map_err(|e| {
                ReelError::transcription(format!(
                    "{} did not write {}: {e}",
                    self.config.label,
                    scratch.display()
                ))
            })?;
            if let Err(e) = tokio::fs::remove_file(&scratch).await {
                tracing::debug!(error = %e, path = %scratch.display(), "Failed to remove transcript scratch file");
            }
            content
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        Ok(parse_transcript(&json, self.config.format))
    }

    fn label(&self) -> &str {
        &self.config.label
    }
}

/// Build the ordered strategy list from configuration.
pub fn transcribers_from_config(
    strategies: &[TranscriptionStrategyConfig],
) -> Vec<std::sync::Arc<dyn TranscriptionClient>> {
    strategies
        .iter()
        .cloned()
        .map(|config| {
            std::sync::Arc::new(CommandTranscriber::new(config))
                as std::sync::Arc<dyn TranscriptionClient>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_payload() {
        let json = r#"{"text":"hello world","segments":[
            {"id":0,"start":0.0,"end":1.2,"text":" Hello world."},
            {"id":1,"start":1.2,"end":2.0,"text":"   "}
        ]}"#;
        let transcript = parse_transcript(json, TranscriptFormat::Segments);
        assert_eq!(
            transcript.segments(),
            &[TranscriptionSegment::new(0.0, 1.2, " Hello world.")]
        );
    }

    #[test]
    fn test_parse_whisper_cpp_payload_converts_milliseconds() {
        let json = r#"{"transcription":[
            {"timestamps":{"from":"00:00:00,000","to":"00:00:02,500"},
             "offsets":{"from":0,"to":2500},"text":" This is a test"}
        ]}"#;
        let transcript = parse_transcript(json, TranscriptFormat::WhisperCpp);
        let segments = transcript.segments();
        assert_eq!(segments.len(), 1);
        assert!((segments[0].end_secs - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_shape_fails_closed() {
        // A segments payload given to the whisper.cpp parser is not sniffed.
        let json = r#"{"segments":[{"start":0.0,"end":1.0,"text":"hi"}]}"#;
        let transcript = parse_transcript(json, TranscriptFormat::WhisperCpp);
        assert!(matches!(transcript, Transcript::Unusable(_)));

        let garbage = parse_transcript("not json", TranscriptFormat::Segments);
        assert!(!garbage.is_usable());
    }

    #[test]
    fn test_backwards_segments_are_dropped_and_rest_sorted() {
        let transcript = Transcript::from_segments(vec![
            TranscriptionSegment::new(3.0, 4.0, "later"),
            TranscriptionSegment::new(2.0, 1.0, "backwards"),
            TranscriptionSegment::new(0.0, 1.0, "first"),
        ]);
        let texts: Vec<_> = transcript.segments().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "later"]);
    }

    #[test]
    fn test_empty_segment_list_is_unusable() {
        let transcript = parse_transcript(r#"{"segments":[]}"#, TranscriptFormat::Segments);
        assert!(matches!(transcript, Transcript::Unusable(_)));
    }

    #[test]
    fn test_placeholders_substituted() {
        let transcriber = CommandTranscriber::new(TranscriptionStrategyConfig {
            label: "whisper base".to_string(),
            program: "whisper-cli".to_string(),
            args: vec![
                "-f".to_string(),
                "{audio}".to_string(),
                "-of".to_string(),
                "{output}".to_string(),
            ],
            format: TranscriptFormat::WhisperCpp,
            timeout_secs: 600,
        });
        let audio = Path::new("/stage/audio.mp3");
        let scratch = transcriber.scratch_path(audio);
        assert_eq!(
            scratch,
            PathBuf::from("/stage/audio.whisper-base.transcript.json")
        );
        let args = transcriber.build_args(audio, &scratch);
        assert_eq!(args[1], "/stage/audio.mp3");
        assert_eq!(args[3], "/stage/audio.whisper-base.transcript.json");
        assert!(transcriber.wants_output_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_transcriber_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let transcriber = CommandTranscriber::new(TranscriptionStrategyConfig {
            label: "echo".to_string(),
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                r#"printf '{"segments":[{"start":0.0,"end":1.5,"text":"hello there"}]}'"#
                    .to_string(),
            ],
            format: TranscriptFormat::Segments,
            timeout_secs: 10,
        });

        let transcript = transcriber.transcribe(&audio).await.unwrap();
        assert_eq!(transcript.segments()[0].text, "hello there");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_transcriber_reports_failed_program() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let transcriber = CommandTranscriber::new(TranscriptionStrategyConfig {
            label: "broken".to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo model missing >&2; exit 2".to_string()],
            format: TranscriptFormat::Segments,
            timeout_secs: 10,
        });

        let err = transcriber.transcribe(&audio).await.unwrap_err();
        assert!(err.to_string().contains("model missing"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_program_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let transcriber = CommandTranscriber::new(TranscriptionStrategyConfig {
            label: "stuck".to_string(),
            program: "sleep".to_string(),
            args: vec!["30".to_string()],
            format: TranscriptFormat::Segments,
            timeout_secs: 1,
        });

        let started = std::time::Instant::now();
        let err = transcriber.transcribe(&audio).await.unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
