//! StoryReel Render Model
//!
//! Defines the core data contracts for the render job pipeline:
//! - **Request:** Narration sentences, the voice-over track, per-sentence assets, and render options
//! - **Timing:** One contiguous interval per sentence covering the whole voice-over
//! - **Timeline:** Frame-accurate scene list handed to a render backend
//! - **Job:** Render job record and its status state machine
//!
//! All times are seconds relative to the start of the voice-over track.

pub mod job;
pub mod request;
pub mod timeline;
pub mod timing;

pub use job::*;
pub use request::*;
pub use timeline::*;
pub use timing::*;
