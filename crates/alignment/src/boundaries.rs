//! Sentence boundary arithmetic.
//!
//! A boundary list for `N` sentences has `N + 1` entries: sentence `i` runs
//! from `b[i]` to `b[i + 1]`. Every tier produces a raw boundary list and
//! [`seal_boundaries`] turns it into one that satisfies the coverage
//! invariants exactly.

use storyreel_model::request::SentenceInput;
use storyreel_model::timing::SentenceTiming;

/// Smallest separation used when the configured minimum is zero.
const MIN_SEPARATION_SECS: f64 = 1e-6;

/// Word-count proportional split of `[start, end]`.
///
/// Boundary `i + 1` sits at the cumulative weight through sentence `i`
/// divided by the total weight. A duration shorter than `min_secs` pushes
/// the following boundary forward; the final boundary is then pinned to
/// `end` regardless of rounding.
pub fn proportional_boundaries(weights: &[usize], start: f64, end: f64, min_secs: f64) -> Vec<f64> {
    let mut bounds = Vec::with_capacity(weights.len() + 1);
    bounds.push(start);
    if weights.is_empty() {
        return bounds;
    }

    let total_weight: usize = weights.iter().map(|w| (*w).max(1)).sum();
    let span = end - start;
    let mut cumulative = 0usize;
    for weight in weights {
        cumulative += (*weight).max(1);
        bounds.push(start + (cumulative as f64 / total_weight as f64) * span);
    }

    for i in 0..weights.len() {
        if bounds[i + 1] - bounds[i] < min_secs {
            bounds[i + 1] = bounds[i] + min_secs;
        }
    }

    let last = bounds.len() - 1;
    bounds[last] = end;
    bounds
}

/// Force a raw boundary list to tile `[0, total_secs]`.
///
/// Afterwards `b[0] == 0`, `b[N] == total_secs` exactly, and consecutive
/// boundaries are at least `min_secs` apart. If the track is too short for
/// `N * min_secs` the track is split evenly instead.
pub fn seal_boundaries(raw: &[f64], total_secs: f64, min_secs: f64) -> Vec<f64> {
    let n = raw.len().saturating_sub(1);
    if n == 0 {
        return vec![0.0];
    }

    let min = min_secs.max(MIN_SEPARATION_SECS);
    if total_secs < min * n as f64 {
        let mut even: Vec<f64> = (0..=n).map(|i| total_secs * i as f64 / n as f64).collect();
        even[0] = 0.0;
        even[n] = total_secs;
        return even;
    }

    let mut bounds = Vec::with_capacity(n + 1);
    let mut previous = 0.0f64;
    for value in raw {
        let value = if value.is_finite() { *value } else { previous };
        let clamped = value.clamp(0.0, total_secs);
        bounds.push(clamped);
        previous = clamped;
    }
    bounds[0] = 0.0;
    bounds[n] = total_secs;

    for i in 1..n {
        bounds[i] = bounds[i].max(bounds[i - 1] + min);
    }
    for i in (1..n).rev() {
        bounds[i] = bounds[i].min(bounds[i + 1] - min);
    }

    bounds
}

/// Pair sealed boundaries with their sentences.
pub fn timings_from_boundaries(sentences: &[SentenceInput], bounds: &[f64]) -> Vec<SentenceTiming> {
    sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| SentenceTiming {
            index,
            text: sentence.text.clone(),
            start_seconds: bounds[index],
            end_seconds: bounds[index + 1],
        })
        .collect()
}
