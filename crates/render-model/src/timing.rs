//! Sentence timings produced by the alignment engine.

use serde::{Deserialize, Serialize};

/// When one sentence is on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceTiming {
    pub index: usize,
    pub text: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl SentenceTiming {
    pub fn duration_secs(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Which alignment strategy produced a set of timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentTier {
    /// Word timings from a transcript, matched sentence by sentence.
    Transcript,
    /// Word-count split over the audible (non-silent) portions only.
    VoiceActivity,
    /// Word-count split over the whole track.
    Proportional,
}

impl AlignmentTier {
    pub fn as_str(self) -> &'static str {
        match self {
            AlignmentTier::Transcript => "transcript",
            AlignmentTier::VoiceActivity => "voice-activity",
            AlignmentTier::Proportional => "proportional",
        }
    }
}

impl std::fmt::Display for AlignmentTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `timings` tile `[0, total_secs]` contiguously.
///
/// Requires: positional indices, first start at exactly 0, each end equal to
/// the next start, strictly positive durations, and the last end exactly
/// `total_secs`.
pub fn validate_timings(timings: &[SentenceTiming], total_secs: f64) -> Result<(), TimingError> {
    let first = timings.first().ok_or(TimingError::Empty)?;
    if first.start_seconds != 0.0 {
        return Err(TimingError::NotAnchoredAtZero {
            start: first.start_seconds,
        });
    }

    for (i, timing) in timings.iter().enumerate() {
        if timing.index != i {
            return Err(TimingError::IndexMismatch {
                position: i,
                index: timing.index,
            });
        }
        if !(timing.start_seconds.is_finite() && timing.end_seconds.is_finite())
            || timing.end_seconds <= timing.start_seconds
        {
            return Err(TimingError::NonPositiveDuration {
                index: i,
                start: timing.start_seconds,
                end: timing.end_seconds,
            });
        }
        if let Some(next) = timings.get(i + 1) {
            if next.start_seconds != timing.end_seconds {
                return Err(TimingError::Discontinuity {
                    index: i,
                    end: timing.end_seconds,
                    next_start: next.start_seconds,
                });
            }
        }
    }

    let last = &timings[timings.len() - 1];
    if last.end_seconds != total_secs {
        return Err(TimingError::NotEndingAtTotal {
            end: last.end_seconds,
            total: total_secs,
        });
    }
    Ok(())
}

/// Ways a timing list can break its coverage invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimingError {
    #[error("no timings")]
    Empty,

    #[error("first timing starts at {start}, expected 0")]
    NotAnchoredAtZero { start: f64 },

    #[error("timing at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: usize },

    #[error("timing {index} has non-positive duration ({start}..{end})")]
    NonPositiveDuration { index: usize, start: f64, end: f64 },

    #[error("timing {index} ends at {end} but the next starts at {next_start}")]
    Discontinuity {
        index: usize,
        end: f64,
        next_start: f64,
    },

    #[error("last timing ends at {end}, expected {total}")]
    NotEndingAtTotal { end: f64, total: f64 },
}
