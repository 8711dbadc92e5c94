//! Text canonicalization and keyword extraction.
//!
//! Shared by every matching tier: queries and cached entries go through the
//! same normalization so comparisons are apples-to-apples. Deterministic,
//! no side effects.

pub mod synonyms;

use std::collections::HashSet;

/// Tokens too common to discriminate between entries.
const STOP_WORDS: &[&str] = &[
    "what", "is", "are", "the", "a", "an", "for", "of", "in", "on", "at", "to", "and", "or",
    "but", "with", "by", "from", "as", "about", "into", "when", "where", "who", "which", "why",
    "how", "this", "that", "there", "can", "could", "should", "would", "may", "might", "must",
    "will",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercase, replace non-word characters with spaces, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract meaningful keywords: tokens longer than 2 chars with stop words
/// removed. If filtering empties the set (e.g. "how is that"), fall back to
/// all tokens longer than 2 chars so short queries still match something.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    let normalized = normalize_text(text);
    let keywords: HashSet<String> = normalized
        .split_whitespace()
        .filter(|w| w.len() > 2 && !is_stop_word(w))
        .map(str::to_string)
        .collect();

    if !keywords.is_empty() {
        return keywords;
    }

    normalized
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_text("What is the  Minimum Attendance required?!"),
            "what is the minimum attendance required"
        );
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  ?!  "), "");
    }

    #[test]
    fn test_extract_keywords_filters_stop_words() {
        let keywords = extract_keywords("What is the minimum attendance required?");
        assert!(keywords.contains("minimum"));
        assert!(keywords.contains("attendance"));
        assert!(keywords.contains("required"));
        assert!(!keywords.contains("what"));
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("is"));
    }

    #[test]
    fn test_extract_keywords_drops_short_tokens() {
        let keywords = extract_keywords("go to lab 2");
        assert!(keywords.contains("lab"));
        assert!(!keywords.contains("go"));
        assert!(!keywords.contains("2"));
    }

    #[test]
    fn test_extract_keywords_stop_word_fallback() {
        // Every token > 2 chars is a stop word; the fallback keeps them so the
        // query still carries some signal.
        let keywords = extract_keywords("what is that");
        assert!(keywords.contains("what"));
        assert!(keywords.contains("that"));
    }
}
