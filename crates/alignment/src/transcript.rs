//! Transcript tier: locate each sentence in the word timeline.
//!
//! Sentences are matched in order against a cursor that only moves forward,
//! so matched windows are monotonic and no transcript word is used twice.
//! The first sentence that cannot be matched ends the pass; it and every
//! later sentence share the remaining audio by word count.

use storyreel_common::config::AlignmentSettings;
use storyreel_model::request::SentenceInput;

use crate::boundaries::proportional_boundaries;
use crate::text::{sentence_weight, tokenize};
use crate::words::WordTiming;

/// Raw boundaries produced by the transcript pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMatch {
    /// `N + 1` unsealed boundaries.
    pub boundaries: Vec<f64>,
    /// Leading sentences that were located in the transcript.
    pub matched: usize,
}

/// A located sentence, in real seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MatchedSpan {
    start_secs: f64,
    end_secs: f64,
}

/// Best window for `tokens` at or after `cursor`.
///
/// Returns `(position, window_len)` when the match ratio reaches
/// `threshold`. The ratio is always taken over the sentence length, so a
/// window truncated by the end of the transcript scores lower. Ties keep the
/// earliest position.
fn find_window(
    tokens: &[String],
    words: &[WordTiming],
    cursor: usize,
    threshold: f64,
) -> Option<(usize, usize)> {
    if tokens.is_empty() || cursor >= words.len() {
        return None;
    }

    let window = tokens.len().min(words.len() - cursor);
    let mut best: Option<(usize, usize)> = None;

    for position in cursor..=words.len() - window {
        let matches = tokens
            .iter()
            .zip(&words[position..position + window])
            .filter(|(token, word)| **token == word.token)
            .count();
        if best.map_or(true, |(_, best_matches)| matches > best_matches) {
            best = Some((position, matches));
        }
    }

    let (position, matches) = best?;
    let ratio = matches as f64 / tokens.len() as f64;
    (matches > 0 && ratio >= threshold).then_some((position, window))
}

/// Match `sentences` against the word timeline of an audio track of
/// `total_secs`.
pub fn transcript_boundaries(
    words: &[WordTiming],
    sentences: &[SentenceInput],
    total_secs: f64,
    settings: &AlignmentSettings,
) -> TranscriptMatch {
    let mut cursor = 0usize;
    let mut last_end = 0.0f64;
    let mut spans: Vec<MatchedSpan> = Vec::with_capacity(sentences.len());

    for (index, sentence) in sentences.iter().enumerate() {
        let tokens = tokenize(&sentence.text);
        let Some((position, window)) =
            find_window(&tokens, words, cursor, settings.match_threshold)
        else {
            tracing::debug!(index, cursor, "Sentence not found in transcript");
            break;
        };

        let first = &words[position];
        let last = &words[position + window - 1];
        let start_secs = first.start_secs.max(last_end).clamp(0.0, total_secs);
        let end_secs = last
            .end_secs
            .max(start_secs + settings.min_match_gap_secs)
            .clamp(0.0, total_secs);

        tracing::trace!(index, position, window, start_secs, end_secs, "Sentence matched");
        spans.push(MatchedSpan {
            start_secs,
            end_secs,
        });
        cursor = position + window;
        last_end = end_secs;
    }

    let matched = spans.len();
    let mut boundaries = Vec::with_capacity(sentences.len() + 1);
    boundaries.push(0.0);
    // Each matched sentence runs until the next one starts, absorbing pauses.
    boundaries.extend(spans.iter().skip(1).map(|span| span.start_secs));

    if matched == sentences.len() {
        boundaries.push(total_secs);
    } else {
        let remainder_start = if matched == 0 { 0.0 } else { last_end };
        let weights: Vec<usize> = sentences[matched..]
            .iter()
            .map(|s| sentence_weight(&s.text))
            .collect();
        let tail = proportional_boundaries(
            &weights,
            remainder_start,
            total_secs,
            settings.min_sentence_secs,
        );
        if matched == 0 {
            boundaries.clear();
        }
        boundaries.extend(tail);
    }

    TranscriptMatch {
        boundaries,
        matched,
    }
}
