//! Per-entry co-occurrence patterns: the near-zero-latency first pass.
//!
//! Each cached entry gets one compiled regex requiring its two most
//! discriminative concepts to both appear somewhere in the query, in either
//! order, with each concept widened to its synonym alternation. The tier is
//! intentionally conservative: a miss falls through to scoring, and the
//! multi-keyword co-occurrence requirement keeps false positives rare.

use std::collections::HashSet;

use regex::Regex;

use crate::text::{extract_keywords, normalize_text, synonyms::synonyms_for};
use crate::types::CachedEntry;

/// Rank an entry's keywords by how discriminative they are. Longer tokens
/// first (they carry more meaning than short generic ones), ties broken
/// lexicographically so ranking is deterministic across rebuilds.
fn ranked_keywords(keywords: &HashSet<String>) -> Vec<&str> {
    let mut ranked: Vec<&str> = keywords.iter().map(String::as_str).collect();
    ranked.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    ranked
}

/// One concept as a regex alternation: the keyword plus its synonym group,
/// escaped, longest alternative first so the engine prefers the fullest form.
fn concept_alternation(keywords: &[&str]) -> String {
    let mut alternatives: Vec<&str> = Vec::new();
    for keyword in keywords {
        alternatives.push(keyword);
        alternatives.extend(synonyms_for(keyword));
    }
    alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    alternatives.dedup();

    let escaped: Vec<String> = alternatives.iter().map(|a| regex::escape(a)).collect();
    format!(r"\b(?:{})\b", escaped.join("|"))
}

/// Compile the co-occurrence pattern for an entry's keyword set.
///
/// The top keyword forms the first concept; the next `max_keywords - 1`
/// keywords together form the second, so the most important token must appear
/// alongside at least one of the others. An entry with a single usable
/// keyword degrades to that single required token; no keywords means no
/// pattern (the entry is still scorable).
pub fn build_entry_pattern(keywords: &HashSet<String>, max_keywords: usize) -> Option<Regex> {
    let ranked = ranked_keywords(keywords);
    if ranked.is_empty() {
        return None;
    }

    let top: Vec<&str> = ranked.into_iter().take(max_keywords.max(1)).collect();
    let first = concept_alternation(&top[..1]);

    let source = if top.len() >= 2 {
        let rest = concept_alternation(&top[1..]);
        format!(r"(?i)(?:{first}.*{rest}|{rest}.*{first})")
    } else {
        format!(r"(?i){first}")
    };

    match Regex::new(&source) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            tracing::warn!(error = %e, "failed to compile entry pattern, entry stays scorable only");
            None
        }
    }
}

/// Scan all compiled patterns against a raw query. When several entries
/// match, prefer the one sharing the most keywords with the query; the tier
/// reports a fixed HIGH confidence either way.
pub fn best_pattern_match<'a>(query: &str, entries: &'a [CachedEntry]) -> Option<&'a CachedEntry> {
    let normalized = normalize_text(query);
    if normalized.is_empty() {
        return None;
    }
    let query_keywords = extract_keywords(query);

    let mut best: Option<(&CachedEntry, usize)> = None;
    for entry in entries {
        let Some(pattern) = &entry.pattern else {
            continue;
        };
        if !pattern.is_match(&normalized) {
            continue;
        }
        let overlap = entry.keywords.intersection(&query_keywords).count();
        if best.map_or(true, |(_, best_overlap)| overlap > best_overlap) {
            best = Some((entry, overlap));
        }
    }
    best.map(|(entry, _)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::cache::enrich_entry;
    use crate::types::{Category, KnowledgeEntry};

    fn cached(question: &str, answer: &str, category: Category) -> CachedEntry {
        let entry = KnowledgeEntry::new(question, answer, category).approved();
        enrich_entry(&entry, 4)
    }

    fn keyword_set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_pattern_requires_co_occurrence() {
        let pattern = build_entry_pattern(&keyword_set(&["attendance", "minimum"]), 4).unwrap();
        assert!(pattern.is_match("what minimum attendance do i need"));
        assert!(pattern.is_match("attendance that is the minimum"));
        // Only one concept present: no match.
        assert!(!pattern.is_match("tell me about attendance history"));
    }

    #[test]
    fn test_pattern_matches_through_synonyms() {
        let pattern = build_entry_pattern(&keyword_set(&["office", "hour"]), 4).unwrap();
        // "timing" is a synonym surface form of "hour".
        assert!(pattern.is_match("college office timing please"));
        assert!(!pattern.is_match("college timing please"));
    }

    #[test]
    fn test_single_keyword_degrades_to_required_token() {
        let pattern = build_entry_pattern(&keyword_set(&["hostel"]), 4).unwrap();
        assert!(pattern.is_match("is there a hostel"));
        assert!(!pattern.is_match("is there a mess"));
    }

    #[test]
    fn test_empty_keywords_produce_no_pattern() {
        assert!(build_entry_pattern(&HashSet::new(), 4).is_none());
    }

    #[test]
    fn test_no_match_without_entry_keywords_in_query() {
        let entries = vec![cached(
            "What is the minimum attendance required?",
            "75% attendance is mandatory in all subjects.",
            Category::Rule,
        )];
        // Query shares no keywords or synonyms with the entry.
        assert!(best_pattern_match("when does the canteen open", &entries).is_none());
    }

    #[test]
    fn test_scenario_attendance_question_hits() {
        let entries = vec![cached(
            "What is the minimum attendance required?",
            "75% attendance is mandatory in all subjects.",
            Category::Rule,
        )];
        let hit = best_pattern_match("what is attendance required", &entries);
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().id, entries[0].id);
    }

    #[test]
    fn test_best_match_prefers_denser_overlap() {
        let manual = |words: &[&str]| {
            let keywords = keyword_set(words);
            let mut entry = cached("placeholder", "placeholder", Category::Exam);
            entry.pattern = build_entry_pattern(&keywords, 4);
            entry.keywords = keywords;
            entry
        };
        // Both patterns match the query; the first shares two query keywords,
        // the second only one.
        let entries = vec![manual(&["internal", "exam"]), manual(&["marks", "test"])];
        let hit = best_pattern_match("internal exam timetable marks", &entries).unwrap();
        assert_eq!(hit.id, entries[0].id);
    }
}
