//! Sentence timings to frame-accurate timeline.
//!
//! [`TimelineBuilder::build`] is pure: it reads no files and only turns
//! seconds into frames, attaches visual sources, and applies the fixed
//! scene choices (call-to-action clip, glitch scene).

use storyreel_model::request::RenderOptions;
use storyreel_model::timeline::{Scene, SceneEffects, Timeline};
use storyreel_model::timing::SentenceTiming;

/// Frame values this close to an integer are snapped before rounding.
const FRAME_EPSILON: f64 = 1e-6;

/// Visual source of one scene, relative to the staging directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneSource {
    pub image_src: Option<String>,
    pub video_src: Option<String>,
}

impl SceneSource {
    pub fn image(src: impl Into<String>) -> Self {
        Self {
            image_src: Some(src.into()),
            video_src: None,
        }
    }

    pub fn video(src: impl Into<String>) -> Self {
        Self {
            image_src: None,
            video_src: Some(src.into()),
        }
    }
}

/// Output dimensions for the given orientation and size options.
pub fn resolution(options: &RenderOptions) -> (u32, u32) {
    match (options.is_short, options.use_lower_resolution) {
        (true, false) => (1080, 1920),
        (true, true) => (720, 1280),
        (false, false) => (1920, 1080),
        (false, true) => (1280, 720),
    }
}

pub fn frame_rate(options: &RenderOptions) -> u32 {
    if options.use_lower_fps {
        24
    } else {
        30
    }
}

fn snap(frames: f64) -> f64 {
    let rounded = frames.round();
    if (frames - rounded).abs() < FRAME_EPSILON {
        rounded
    } else {
        frames
    }
}

/// `(start_frame, duration_frames)` for a sentence interval.
///
/// The start is floored and the end ceiled so a scene never starts late or
/// ends early; every scene gets at least one frame.
pub fn frame_span(start_secs: f64, end_secs: f64, fps: u32) -> (u64, u64) {
    let fps = fps as f64;
    let start_frame = snap(start_secs.max(0.0) * fps).floor() as u64;
    let end_frame = snap(end_secs.max(0.0) * fps).ceil() as u64;
    (start_frame, end_frame.saturating_sub(start_frame).max(1))
}

/// Builds [`Timeline`]s for one staged job.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    audio_src: String,
    call_to_action: Option<(String, String)>,
}

impl TimelineBuilder {
    pub fn new(audio_src: impl Into<String>) -> Self {
        Self {
            audio_src: audio_src.into(),
            call_to_action: None,
        }
    }

    /// Show `video_src` for any sentence whose text is exactly `text`.
    pub fn with_call_to_action(mut self, text: impl Into<String>, video_src: impl Into<String>) -> Self {
        self.call_to_action = Some((text.into(), video_src.into()));
        self
    }

    /// Build the timeline. `sources` is positional; missing entries render
    /// as text-only scenes.
    pub fn build(
        &self,
        timings: &[SentenceTiming],
        sources: &[SceneSource],
        options: &RenderOptions,
    ) -> Timeline {
        let fps = frame_rate(options);
        let (width, height) = resolution(options);
        let glitch_index = options.glitch_transition.then_some(timings.len() / 2);

        let scenes: Vec<Scene> = timings
            .iter()
            .enumerate()
            .map(|(position, timing)| {
                let (start_frame, duration_frames) =
                    frame_span(timing.start_seconds, timing.end_seconds, fps);
                let source = match &self.call_to_action {
                    Some((text, video)) if *text == timing.text => SceneSource::video(video.clone()),
                    _ => sources.get(position).cloned().unwrap_or_default(),
                };

                Scene {
                    index: timing.index,
                    text: timing.text.clone(),
                    image_src: source.image_src,
                    video_src: source.video_src,
                    start_frame,
                    duration_frames,
                    effects: SceneEffects {
                        glitch: glitch_index == Some(position),
                    },
                }
            })
            .collect();

        let duration_in_frames = scenes.last().map(Scene::end_frame).unwrap_or(0);

        tracing::debug!(
            scenes = scenes.len(),
            fps,
            width,
            height,
            duration_in_frames,
            "Timeline built"
        );

        Timeline {
            width,
            height,
            fps,
            duration_in_frames,
            audio_src: self.audio_src.clone(),
            scenes,
        }
    }
}
