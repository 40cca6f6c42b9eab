//! Voice-activity tier: proportional split over speech only.
//!
//! Audible spans are laid end to end into a compressed timeline that
//! contains no silence. Sentences are split proportionally in compressed
//! time and every boundary is mapped back onto the real track.

use storyreel_audio::silence::AudibleSpan;
use storyreel_common::config::AlignmentSettings;

use crate::boundaries::proportional_boundaries;

/// Audible spans indexed by their offset in compressed time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedTimeline {
    /// `(compressed_offset, span)` in playback order.
    entries: Vec<(f64, AudibleSpan)>,
    length_secs: f64,
}

impl CompressedTimeline {
    /// Build from spans, dropping empty or inverted ones.
    pub fn new(spans: &[AudibleSpan]) -> Self {
        let mut sorted: Vec<AudibleSpan> = spans
            .iter()
            .copied()
            .filter(|s| s.start_secs.is_finite() && s.end_secs.is_finite())
            .filter(|s| s.duration_secs() > 0.0)
            .collect();
        sorted.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

        let mut entries = Vec::with_capacity(sorted.len());
        let mut offset = 0.0;
        for span in sorted {
            entries.push((offset, span));
            offset += span.duration_secs();
        }

        Self {
            entries,
            length_secs: offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total audible time.
    pub fn length_secs(&self) -> f64 {
        self.length_secs
    }

    /// Map compressed time back to real time.
    ///
    /// Span ranges are half-open, so a value sitting exactly on a junction
    /// lands at the start of the next span rather than the end of the
    /// previous one. Values past the end map to the last span's end.
    pub fn to_real(&self, compressed_secs: f64) -> f64 {
        let Some((_, last)) = self.entries.last() else {
            return compressed_secs;
        };

        for (offset, span) in &self.entries {
            if compressed_secs < offset + span.duration_secs() {
                let within = (compressed_secs - offset).max(0.0);
                return span.start_secs + within;
            }
        }
        last.end_secs
    }
}

/// Raw boundaries for `weights` over the speech in `spans`.
///
/// Returns `None` when there is no audible time to split.
pub fn voice_activity_boundaries(
    spans: &[AudibleSpan],
    weights: &[usize],
    total_secs: f64,
    settings: &AlignmentSettings,
) -> Option<Vec<f64>> {
    let timeline = CompressedTimeline::new(spans);
    if timeline.is_empty() {
        return None;
    }

    let compressed = proportional_boundaries(
        weights,
        0.0,
        timeline.length_secs(),
        settings.min_sentence_secs,
    );

    let mut bounds: Vec<f64> = compressed
        .iter()
        .map(|c| timeline.to_real(*c).clamp(0.0, total_secs))
        .collect();
    // Leading and trailing silence belong to the first and last sentence.
    if let Some(first) = bounds.first_mut() {
        *first = 0.0;
    }
    if let Some(last) = bounds.last_mut() {
        *last = total_secs;
    }
    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans() -> Vec<AudibleSpan> {
        vec![AudibleSpan::new(1.0, 3.0), AudibleSpan::new(5.0, 9.0)]
    }

    #[test]
    fn test_compressed_length_is_sum_of_spans() {
        let timeline = CompressedTimeline::new(&spans());
        assert_eq!(timeline.length_secs(), 6.0);
    }

    #[test]
    fn test_mapping_skips_silence() {
        let timeline = CompressedTimeline::new(&spans());
        assert_eq!(timeline.to_real(0.0), 1.0);
        assert_eq!(timeline.to_real(1.5), 2.5);
        // Junction goes to the start of the next span.
        assert_eq!(timeline.to_real(2.0), 5.0);
        assert_eq!(timeline.to_real(3.0), 6.0);
        assert_eq!(timeline.to_real(6.0), 9.0);
        assert_eq!(timeline.to_real(7.5), 9.0);
    }

    #[test]
    fn test_boundaries_land_on_speech() {
        let bounds =
            voice_activity_boundaries(&spans(), &[1, 1], 10.0, &AlignmentSettings::default())
                .unwrap();
        // Compressed midpoint 3.0 is one second into the second span.
        assert_eq!(bounds, vec![0.0, 6.0, 10.0]);
    }

    #[test]
    fn test_no_audible_time_declines() {
        assert!(voice_activity_boundaries(&[], &[1], 5.0, &AlignmentSettings::default()).is_none());
        let inverted = [AudibleSpan::new(3.0, 2.0)];
        assert!(
            voice_activity_boundaries(&inverted, &[1], 5.0, &AlignmentSettings::default())
                .is_none()
        );
    }

    #[test]
    fn test_unsorted_spans_are_ordered() {
        let timeline =
            CompressedTimeline::new(&[AudibleSpan::new(5.0, 9.0), AudibleSpan::new(1.0, 3.0)]);
        assert_eq!(timeline.to_real(0.5), 1.5);
    }
}
