//! StoryReel Alignment: sentence timing from a voice-over
//!
//! Maps narration sentences onto the voice-over so every sentence gets one
//! contiguous interval and the intervals tile the whole track:
//! - **Transcript tier:** Match sentence tokens against transcript word timings
//! - **Voice-activity tier:** Split only the audible time, then map back to real time
//! - **Proportional tier:** Split the track by sentence word count
//!
//! Everything except [`engine`] is pure computation: inputs are data,
//! outputs are data.

pub mod boundaries;
pub mod engine;
pub mod text;
pub mod transcript;
pub mod voice_activity;
pub mod words;

pub use engine::{AlignmentEngine, AlignmentOutcome};
