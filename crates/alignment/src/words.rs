//! Flat word timeline derived from coarse transcript segments.

use storyreel_audio::transcription::TranscriptionSegment;

use crate::text::normalize_token;

/// One normalized transcript word with an estimated span.
#[derive(Debug, Clone, PartialEq)]
pub struct WordTiming {
    pub token: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Spread each segment's span evenly over its whitespace-separated words.
///
/// Word `i` of `count` gets `start + span*i/count .. start + span*(i+1)/count`.
/// Words that normalize to nothing keep their share of the span but are
/// dropped from the output.
pub fn build_word_timeline(segments: &[TranscriptionSegment]) -> Vec<WordTiming> {
    let mut words = vec![];

    for segment in segments {
        let raw: Vec<&str> = segment.text.split_whitespace().collect();
        if raw.is_empty() {
            continue;
        }
        let count = raw.len() as f64;
        let span = (segment.end_secs - segment.start_secs).max(0.0);

        for (i, word) in raw.iter().enumerate() {
            let token = normalize_token(word);
            if token.is_empty() {
                continue;
            }
            words.push(WordTiming {
                token,
                start_secs: segment.start_secs + span * i as f64 / count,
                end_secs: segment.start_secs + span * (i + 1) as f64 / count,
            });
        }
    }

    words
}
