//! Token normalization shared by transcripts and script sentences.

/// Lowercase and strip leading/trailing non-alphanumeric characters.
///
/// `"Hello,"` → `"hello"`, `"(don't)"` → `"don't"`, `"--"` → `""`.
pub fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Whitespace-split, normalized, non-empty tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Proportional weight of a sentence: its word count, at least 1.
pub fn sentence_weight(text: &str) -> usize {
    tokenize(text).len().max(1)
}
