//! Render job record and its status state machine.
//!
//! ```text
//! queued ──▶ processing ──▶ rendering ──▶ completed
//!    │            │              │
//!    └────────────┴──────────────┴──────▶ failed
//! ```
//!
//! `completed` and `failed` are terminal; a terminal job is never modified.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;
use crate::timing::AlignmentTier;

/// Lifecycle state of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Rendering,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Rendering => "rendering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// States in which a background task is actively working on the job.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Processing | JobStatus::Rendering)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Processing)
            | (JobStatus::Processing, JobStatus::Rendering)
            | (JobStatus::Rendering, JobStatus::Completed) => true,
            (from, JobStatus::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Opaque unique identifier (UUID v4).
    pub id: String,

    pub status: JobStatus,

    /// Failure message; set only in `failed`.
    pub error: Option<String>,

    /// Voice-over the job was submitted with.
    pub audio_path: PathBuf,

    /// Rendered file; set only in `completed`.
    pub video_path: Option<PathBuf>,

    /// Render plan, available once built.
    pub timeline: Option<Timeline>,

    /// Alignment strategy that produced the timeline.
    #[serde(default)]
    pub alignment_tier: Option<AlignmentTier>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    /// Create a new job in `queued`.
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Queued,
            error: None,
            audio_path: audio_path.into(),
            video_path: None,
            timeline: None,
            alignment_tier: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, refreshing `updated_at`.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a rendered file and move to `completed`.
    pub fn complete(&mut self, video_path: impl Into<PathBuf>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.video_path = Some(video_path.into());
        self.error = None;
        Ok(())
    }

    /// Record an error message verbatim and move to `failed`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(message.into());
        self.video_path = None;
        Ok(())
    }

    /// Whether the job has sat in an active state for longer than `timeout`.
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.status.is_active() && now.signed_duration_since(self.updated_at) > timeout
    }
}

/// An attempted move that is not an edge of the job state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {id}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub id: String,
    pub from: JobStatus,
    pub to: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut job = RenderJob::new("/tmp/voice.mp3");
        assert_eq!(job.status, JobStatus::Queued);
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Rendering).unwrap();
        job.complete("/tmp/out.mp4").unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.video_path, Some(PathBuf::from("/tmp/out.mp4")));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_failed_reachable_from_every_active_state() {
        for steps in 0..3 {
            let mut job = RenderJob::new("/tmp/voice.mp3");
            let path = [JobStatus::Processing, JobStatus::Rendering];
            for status in path.iter().take(steps.min(2)) {
                job.transition(*status).unwrap();
            }
            job.fail("boom").unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.error.as_deref(), Some("boom"));
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = RenderJob::new("/tmp/voice.mp3");
        job.fail("first").unwrap();
        let err = job.fail("second").unwrap_err();
        assert_eq!(err.from, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("first"));
        assert!(job.transition(JobStatus::Processing).is_err());
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        let mut job = RenderJob::new("/tmp/voice.mp3");
        assert!(job.transition(JobStatus::Rendering).is_err());
        assert!(job.complete("/tmp/out.mp4").is_err());
        assert!(job.video_path.is_none());
    }

    #[test]
    fn test_staleness_only_applies_to_active_states() {
        let mut job = RenderJob::new("/tmp/voice.mp3");
        let later = job.updated_at + chrono::Duration::seconds(120);
        let timeout = chrono::Duration::seconds(60);
        assert!(!job.is_stale(later, timeout));

        job.transition(JobStatus::Processing).unwrap();
        let later = job.updated_at + chrono::Duration::seconds(120);
        assert!(job.is_stale(later, timeout));
        assert!(!job.is_stale(job.updated_at, timeout));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let job = RenderJob::new("/tmp/voice.mp3");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "queued");
        let parsed: RenderJob = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, job);
    }
}
