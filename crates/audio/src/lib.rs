//! StoryReel Audio Intelligence
//!
//! Everything the pipeline learns from the voice-over track:
//! - **Transcription:** Ordered ASR strategies with explicit, fail-closed output parsers
//! - **Silence Detection:** Audible spans from ffmpeg `silencedetect`
//! - **Probing:** Track duration via ffprobe
//! - **Captions:** SRT/VTT output from sentence timings

pub mod probe;
pub mod silence;
pub mod subtitles;
pub mod transcription;

pub use probe::*;
pub use silence::*;
pub use subtitles::*;
pub use transcription::*;
