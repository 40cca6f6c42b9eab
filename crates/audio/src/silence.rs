//! Voice-activity detection via ffmpeg `silencedetect`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use storyreel_common::config::SilenceSettings;
use storyreel_common::error::{ReelError, ReelResult};

/// Audible spans shorter than this are treated as noise.
const MIN_AUDIBLE_SPAN_SECS: f64 = 0.01;

/// A stretch of non-silent audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudibleSpan {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl AudibleSpan {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// A source of audible spans.
#[async_trait::async_trait]
pub trait SilenceDetector: Send + Sync {
    /// Ordered, non-overlapping audible spans of the audio file.
    async fn detect_audible(&self, audio_path: &Path) -> ReelResult<Vec<AudibleSpan>>;
}

/// Silence markers and stream duration scraped from ffmpeg's log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SilenceReport {
    /// Input duration from the `Duration:` header, if present.
    pub duration_secs: Option<f64>,
    /// `(start, end)` pairs; a trailing silence may have no end.
    pub silences: Vec<(f64, Option<f64>)>,
}

/// Parse the stderr of `ffmpeg -af silencedetect`.
pub fn parse_silencedetect(stderr: &str) -> SilenceReport {
    let mut report = SilenceReport::default();

    for line in stderr.lines() {
        let line = line.trim();

        if report.duration_secs.is_none() {
            if let Some(rest) = line.strip_prefix("Duration:") {
                let stamp = rest.split(',').next().unwrap_or("").trim();
                report.duration_secs = parse_clock(stamp);
                continue;
            }
        }

        if let Some(value) = field_after(line, "silence_start:") {
            report.silences.push((value.max(0.0), None));
        } else if let Some(value) = field_after(line, "silence_end:") {
            match report.silences.last_mut() {
                Some((_, end @ None)) => *end = Some(value),
                // An end without a start means the file opened in silence.
                _ => report.silences.push((0.0, Some(value))),
            }
        }
    }

    report
}

fn field_after(line: &str, key: &str) -> Option<f64> {
    let idx = line.find(key)?;
    line[idx + key.len()..]
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
}

/// Parse `HH:MM:SS.ss`.
fn parse_clock(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Complement of the silences within `[0, total_secs]`.
pub fn audible_spans(silences: &[(f64, Option<f64>)], total_secs: f64) -> Vec<AudibleSpan> {
    let mut spans = vec![];
    let mut cursor = 0.0f64;

    for &(start, end) in silences {
        let start = start.clamp(0.0, total_secs);
        if start - cursor >= MIN_AUDIBLE_SPAN_SECS {
            spans.push(AudibleSpan::new(cursor, start));
        }
        cursor = cursor.max(end.unwrap_or(total_secs).clamp(0.0, total_secs));
    }

    if total_secs - cursor >= MIN_AUDIBLE_SPAN_SECS {
        spans.push(AudibleSpan::new(cursor, total_secs));
    }
    spans
}

/// Runs `ffmpeg -af silencedetect` and inverts the reported silences.
#[derive(Debug, Clone)]
pub struct FfmpegSilenceDetector {
    program: String,
    noise_db: f64,
    min_silence_secs: f64,
    timeout: Duration,
}

impl FfmpegSilenceDetector {
    pub fn new(settings: &SilenceSettings) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            noise_db: settings.noise_db,
            min_silence_secs: settings.min_silence_secs,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// Use a specific ffmpeg binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn filter(&self) -> String {
        format!(
            "silencedetect=noise={}dB:d={}",
            self.noise_db, self.min_silence_secs
        )
    }
}

#[async_trait::async_trait]
impl SilenceDetector for FfmpegSilenceDetector {
    async fn detect_audible(&self, audio_path: &Path) -> ReelResult<Vec<AudibleSpan>> {
        if !audio_path.exists() {
            return Err(ReelError::FileNotFound {
                path: audio_path.to_path_buf(),
            });
        }

        let filter = self.filter();
        let run = tokio::process::Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-nostats")
            .arg("-i")
            .arg(audio_path)
            .args(["-af", &filter, "-f", "null", "-"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                ReelError::silence(format!(
                    "ffmpeg silencedetect timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| ReelError::silence(format!("failed to start {}: {e}", self.program)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ReelError::silence(format!(
                "ffmpeg silencedetect failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let report = parse_silencedetect(&stderr);
        let total = report
            .duration_secs
            .ok_or_else(|| ReelError::silence("ffmpeg did not report an input duration"))?;
        let spans = audible_spans(&report.silences, total);
        tracing::debug!(
            silences = report.silences.len(),
            audible = spans.len(),
            total_secs = total,
            "Silence detection finished"
        );
        Ok(spans)
    }
}
