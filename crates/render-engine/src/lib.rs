//! StoryReel Render Engine
//!
//! Turns aligned sentence timings into a rendered video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! request ──── stage_job ──── <work_dir>/<job>/ (audio, assets)
//!                                   │
//! timings ──── TimelineBuilder ─────┤
//!                                   ▼
//!                             timeline.json
//!                                   │
//!                      RenderBackend (ffmpeg | command)
//!                                   │
//!                                   ▼
//!                               output.mp4
//! ```

pub mod backend;
pub mod command;
pub mod ffmpeg;
pub mod staging;
pub mod timeline_builder;

pub use backend::*;
pub use command::CommandRenderBackend;
pub use ffmpeg::FfmpegSlideshowBackend;
pub use staging::{stage_job, StagedJob};
pub use timeline_builder::{SceneSource, TimelineBuilder};
