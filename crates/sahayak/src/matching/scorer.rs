//! Multi-factor relevance scoring: the deterministic middle tier.
//!
//! Produces a 0–100 confidence for a (query, entry) pair. Used two ways: as
//! the scoring fallback when the pattern tier misses, and to pre-select the
//! bounded candidate list handed to the semantic tier. Pure, no I/O.

use crate::text::{extract_keywords, normalize_text, synonyms::expand_keywords};
use crate::types::{CachedEntry, Confidence, MatchCandidate};

/// Exact-phrase containment short-circuits to this score.
const EXACT_PHRASE_SCORE: f32 = 95.0;
/// Weight of direct keyword overlap.
const DIRECT_OVERLAP_WEIGHT: f32 = 60.0;
/// Weight of synonym-expanded overlap.
const EXPANDED_OVERLAP_WEIGHT: f32 = 20.0;
/// Bonus when a query keyword sits near the start of the cached question.
const POSITION_BONUS: f32 = 10.0;
/// Bonus when query and question are of comparable length.
const LENGTH_BONUS: f32 = 10.0;
/// Single-keyword queries below this are zeroed to suppress spurious
/// one-word matches.
const SINGLE_KEYWORD_FLOOR: f32 = 85.0;

/// Query-side features, computed once per query and shared across all
/// entries being scored.
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub raw: String,
    pub normalized: String,
    pub keywords: std::collections::HashSet<String>,
    pub expanded: std::collections::HashSet<String>,
}

impl QueryFeatures {
    pub fn new(raw: &str) -> Self {
        let keywords = extract_keywords(raw);
        let expanded = expand_keywords(&keywords);
        Self {
            raw: raw.to_string(),
            normalized: normalize_text(raw),
            keywords,
            expanded,
        }
    }
}

/// Score one entry against the query. Deterministic; 0.0 when the query
/// carries no usable signal.
pub fn score_entry(query: &QueryFeatures, entry: &CachedEntry) -> f32 {
    if query.keywords.is_empty() || query.normalized.is_empty() {
        return 0.0;
    }

    let question = &entry.normalized_question;
    let single_keyword = query.keywords.len() == 1;

    // Exact-phrase containment. A multi-keyword query inside the question (or
    // the whole question stated inside the query) is near-certain. Single
    // keywords skip the query-in-question direction: "attendance" appearing
    // somewhere in a question proves very little.
    let contained = (!single_keyword && question.contains(&query.normalized))
        || (!question.is_empty() && query.normalized.contains(question));
    let mut score = if contained {
        EXACT_PHRASE_SCORE
    } else {
        let direct = query.keywords.intersection(&entry.keywords).count() as f32
            / query.keywords.len() as f32;
        let expanded = query.expanded.intersection(&entry.expanded_keywords).count() as f32
            / query.expanded.len() as f32;

        let mut accumulated =
            direct.min(1.0) * DIRECT_OVERLAP_WEIGHT + expanded.min(1.0) * EXPANDED_OVERLAP_WEIGHT;

        if leading_keyword_position_bonus(query, question) {
            accumulated += POSITION_BONUS;
        }
        if length_similarity(&query.normalized, question) >= 0.5 {
            accumulated += LENGTH_BONUS;
        }
        accumulated
    };

    if single_keyword && score < SINGLE_KEYWORD_FLOOR {
        score = 0.0;
    }

    score.clamp(0.0, 100.0)
}

/// True when the first keyword-bearing token of the query appears as a whole
/// token in the first third of the cached question. Token comparison, not
/// substring search: "art" inside "department" must not count.
fn leading_keyword_position_bonus(query: &QueryFeatures, question: &str) -> bool {
    let Some(first_keyword) = query
        .normalized
        .split_whitespace()
        .find(|token| query.keywords.contains(*token))
    else {
        return false;
    };
    let mut offset = 0usize;
    for token in question.split_whitespace() {
        if token == first_keyword {
            return offset * 3 <= question.len();
        }
        offset += token.len() + 1;
    }
    false
}

fn length_similarity(a: &str, b: &str) -> f32 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if long.is_empty() {
        return 0.0;
    }
    short.len() as f32 / long.len() as f32
}

/// Score every cached entry and keep the candidates worth a closer look:
/// descending by score, floor applied, truncated to `cap` to bound the
/// payload of any downstream semantic call.
pub fn rank_candidates<'a>(
    query: &QueryFeatures,
    entries: &'a [CachedEntry],
    floor: f32,
    cap: usize,
) -> Vec<MatchCandidate<'a>> {
    let mut candidates: Vec<MatchCandidate<'a>> = entries
        .iter()
        .filter_map(|entry| {
            let score = score_entry(query, entry);
            (score >= floor).then(|| MatchCandidate {
                entry,
                score,
                confidence: Confidence::from_percent(score),
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(cap);
    candidates
}
