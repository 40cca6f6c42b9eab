//! Render timeline: the frame-accurate scene list a backend renders.
//!
//! Field names serialize in camelCase because the timeline is handed to
//! external renderers as `timeline.json`.

use serde::{Deserialize, Serialize};

/// A complete render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub width: u32,
    pub height: u32,
    pub fps: u32,

    /// Total frames, derived from the last scene's coverage.
    pub duration_in_frames: u64,

    /// Voice-over source, relative to the staging directory.
    pub audio_src: String,

    /// Scenes sorted by index.
    pub scenes: Vec<Scene>,
}

/// One timed visual unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub index: usize,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_src: Option<String>,

    pub start_frame: u64,

    /// Always at least 1.
    pub duration_frames: u64,

    #[serde(default)]
    pub effects: SceneEffects,
}

/// Per-scene effect flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEffects {
    #[serde(default)]
    pub glitch: bool,
}

/// Exclusive playback window for a scene when scenes are laid end to end.
///
/// Rounded start/duration frames may overlap by one frame; slots never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSlot {
    pub index: usize,
    pub start_frame: u64,
    pub frames: u64,
}

impl Scene {
    /// First frame after this scene's coverage.
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.duration_frames
    }

    /// Whether the scene has no visual and renders as a text card.
    pub fn is_text_only(&self) -> bool {
        self.image_src.is_none() && self.video_src.is_none()
    }
}

impl Timeline {
    /// Duration in seconds at the timeline frame rate.
    pub fn duration_secs(&self) -> f64 {
        self.duration_in_frames as f64 / self.fps.max(1) as f64
    }

    /// The scene on screen at `frame`; later scenes win on overlap frames.
    pub fn scene_at_frame(&self, frame: u64) -> Option<&Scene> {
        self.scenes
            .iter()
            .rev()
            .find(|s| s.start_frame <= frame && frame < s.end_frame())
    }

    /// Non-overlapping slots whose lengths sum to `duration_in_frames`
    /// when the first scene starts at frame 0. Zero-length slots (a scene
    /// shorter than one frame) are omitted.
    pub fn scene_slots(&self) -> Vec<SceneSlot> {
        let mut slots = Vec::with_capacity(self.scenes.len());
        for (i, scene) in self.scenes.iter().enumerate() {
            let end = match self.scenes.get(i + 1) {
                Some(next) => next.start_frame,
                None => scene.end_frame(),
            };
            let frames = end.saturating_sub(scene.start_frame);
            if frames > 0 {
                slots.push(SceneSlot {
                    index: scene.index,
                    start_frame: scene.start_frame,
                    frames,
                });
            }
        }
        slots
    }

    /// Check the frame invariants a backend relies on.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.fps == 0 {
            return Err(TimelineError::ZeroFps);
        }
        let last = self.scenes.last().ok_or(TimelineError::NoScenes)?;
        for pair in self.scenes.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(TimelineError::Unsorted {
                    index: pair[1].index,
                });
            }
            if pair[1].start_frame < pair[0].start_frame {
                return Err(TimelineError::StartFrameRegressed {
                    index: pair[1].index,
                });
            }
        }
        if let Some(scene) = self.scenes.iter().find(|s| s.duration_frames == 0) {
            return Err(TimelineError::EmptyScene { index: scene.index });
        }
        if let Some(scene) = self
            .scenes
            .iter()
            .find(|s| s.image_src.is_some() && s.video_src.is_some())
        {
            return Err(TimelineError::ConflictingSources { index: scene.index });
        }
        if self.duration_in_frames != last.end_frame() {
            return Err(TimelineError::DurationMismatch {
                declared: self.duration_in_frames,
                covered: last.end_frame(),
            });
        }
        Ok(())
    }
}

/// Ways a timeline can break its frame invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("timeline has no scenes")]
    NoScenes,

    #[error("timeline fps is zero")]
    ZeroFps,

    #[error("scene {index} is out of order")]
    Unsorted { index: usize },

    #[error("scene {index} starts before its predecessor")]
    StartFrameRegressed { index: usize },

    #[error("scene {index} has zero frames")]
    EmptyScene { index: usize },

    #[error("scene {index} sets both an image and a video")]
    ConflictingSources { index: usize },

    #[error("timeline declares {declared} frames but scenes cover {covered}")]
    DurationMismatch { declared: u64, covered: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(index: usize, start_frame: u64, duration_frames: u64) -> Scene {
        Scene {
            index,
            text: format!("scene {index}"),
            image_src: Some(format!("assets/scene-{index:03}.png")),
            video_src: None,
            start_frame,
            duration_frames,
            effects: SceneEffects::default(),
        }
    }

    fn timeline(scenes: Vec<Scene>) -> Timeline {
        let duration_in_frames = scenes.last().map(Scene::end_frame).unwrap_or(0);
        Timeline {
            width: 1920,
            height: 1080,
            fps: 30,
            duration_in_frames,
            audio_src: "audio.mp3".to_string(),
            scenes,
        }
    }

    #[test]
    fn test_slots_absorb_rounding_overlap() {
        // 0..2.55s and 2.55..5s at 30fps: 0+77 frames, then 76+74 frames.
        let tl = timeline(vec![scene(0, 0, 77), scene(1, 76, 74)]);
        let slots = tl.scene_slots();
        assert_eq!(slots[0].frames, 76);
        assert_eq!(slots[1].frames, 74);
        assert_eq!(
            slots.iter().map(|s| s.frames).sum::<u64>(),
            tl.duration_in_frames
        );
    }

    #[test]
    fn test_sub_frame_scene_has_no_slot() {
        let tl = timeline(vec![scene(0, 0, 10), scene(1, 10, 1), scene(2, 10, 20)]);
        let slots = tl.scene_slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].index, 2);
        assert!(tl.validate().is_ok());
    }

    #[test]
    fn test_scene_at_frame_prefers_later_scene_on_overlap() {
        let tl = timeline(vec![scene(0, 0, 77), scene(1, 76, 74)]);
        assert_eq!(tl.scene_at_frame(76).map(|s| s.index), Some(1));
        assert_eq!(tl.scene_at_frame(10).map(|s| s.index), Some(0));
        assert!(tl.scene_at_frame(150).is_none());
    }

    #[test]
    fn test_validate_rejects_duration_mismatch() {
        let mut tl = timeline(vec![scene(0, 0, 30)]);
        tl.duration_in_frames = 31;
        assert_eq!(
            tl.validate(),
            Err(TimelineError::DurationMismatch {
                declared: 31,
                covered: 30
            })
        );
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let tl = timeline(vec![scene(0, 0, 30)]);
        let json = serde_json::to_value(&tl).unwrap();
        assert_eq!(json["durationInFrames"], 30);
        assert_eq!(json["audioSrc"], "audio.mp3");
        assert_eq!(json["scenes"][0]["startFrame"], 0);
        assert_eq!(json["scenes"][0]["imageSrc"], "assets/scene-000.png");
        assert!(json["scenes"][0].get("videoSrc").is_none());
        assert!((tl.duration_secs() - 1.0).abs() < 1e-9);
    }
}
