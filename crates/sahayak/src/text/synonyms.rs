//! Domain synonym vocabulary and category tag keywords.
//!
//! The mapping is configuration data for the matching tiers, not derived at
//! runtime: a canonical keyword maps to the set of surface forms students
//! actually type ("hours", "timing", "when"). Both keyword expansion and the
//! per-entry co-occurrence patterns draw from it.

use std::collections::HashSet;

use crate::types::Category;

/// Canonical keyword -> surface-form synonyms.
const SYNONYM_MAP: &[(&str, &[&str])] = &[
    (
        "hour",
        &["hour", "hours", "time", "timing", "timings", "schedule", "when", "working time"],
    ),
    ("working", &["working", "operational", "open", "available", "office"]),
    ("office", &["office", "administration", "admin", "department", "college office"]),
    (
        "attendance",
        &["attendance", "presence", "present", "absent", "absence", "minimum attendance"],
    ),
    ("dress", &["dress", "clothing", "uniform", "attire", "wear", "dress code"]),
    ("code", &["code", "rules", "regulation", "guidelines", "policy", "policies"]),
    (
        "syllabus",
        &["syllabus", "syllabi", "subjects", "topics", "content", "courses", "curriculum"],
    ),
    ("subject", &["subject", "subjects", "course", "courses", "paper", "papers"]),
    ("exam", &["exam", "examination", "test", "tests", "assessment", "evaluation"]),
    ("required", &["required", "minimum", "needed", "mandatory", "compulsory"]),
    ("programming", &["programming", "program", "coding", "code", "software"]),
    ("fundamentals", &["fundamentals", "basics", "basic", "intro", "introduction"]),
];

/// Keywords that mark an entry (or query) as belonging to a category.
const CATEGORY_TAG_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Faq,
        &["hour", "time", "working", "office", "contact", "phone", "email", "when", "timing"],
    ),
    (
        Category::Rule,
        &["attendance", "dress", "code", "regulation", "policy", "required", "minimum", "must"],
    ),
    (
        Category::Syllabus,
        &["syllabus", "subject", "course", "semester", "unit", "credit", "topics"],
    ),
    (
        Category::Exam,
        &["exam", "examination", "test", "internal", "marks", "grade", "assessment"],
    ),
    (Category::General, &[]),
];

/// Synonym set for a keyword, if the keyword belongs to any synonym group.
/// Membership is substring-tolerant: "timings" picks up the "hour" group
/// because the group lists it, and "dresscode" picks up "dress"/"code"
/// because those keys are substrings.
pub fn synonyms_for(keyword: &str) -> Vec<&'static str> {
    let mut out = Vec::new();
    for (key, synonyms) in SYNONYM_MAP {
        if synonyms.contains(&keyword) || keyword.contains(key) {
            out.extend(synonyms.iter().copied());
        }
    }
    out
}

/// Widen a keyword set with every synonym group any member belongs to.
pub fn expand_keywords(keywords: &HashSet<String>) -> HashSet<String> {
    let mut expanded: HashSet<String> = keywords.clone();
    for keyword in keywords {
        for synonym in synonyms_for(keyword) {
            expanded.insert(synonym.to_string());
        }
    }
    expanded
}

/// Tag keywords associated with a category.
pub fn category_tag_keywords(category: Category) -> &'static [&'static str] {
    CATEGORY_TAG_KEYWORDS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, keywords)| *keywords)
        .unwrap_or(&[])
}

/// Categories whose tag keywords intersect the given keyword set
/// (substring-tolerant, same rule as synonym membership).
pub fn matching_tags(keywords: &HashSet<String>) -> HashSet<Category> {
    let mut tags = HashSet::new();
    for keyword in keywords {
        for (category, tag_keywords) in CATEGORY_TAG_KEYWORDS {
            if tag_keywords
                .iter()
                .any(|tag| tag == keyword || keyword.contains(tag))
            {
                tags.insert(*category);
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_expand_bridges_hours_and_timing() {
        let expanded = expand_keywords(&set(&["hours"]));
        assert!(expanded.contains("timing"));
        assert!(expanded.contains("schedule"));
        assert!(expanded.contains("hours"));
    }

    #[test]
    fn test_expand_is_substring_tolerant() {
        // "examinations" is not a map key, but it contains the key "exam".
        let expanded = expand_keywords(&set(&["examinations"]));
        assert!(expanded.contains("test"));
        assert!(expanded.contains("assessment"));
    }

    #[test]
    fn test_expand_keeps_unknown_keywords() {
        let expanded = expand_keywords(&set(&["hostel"]));
        assert!(expanded.contains("hostel"));
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn test_expansion_is_pure() {
        let input = set(&["attendance", "dress"]);
        let a = expand_keywords(&input);
        let b = expand_keywords(&input);
        assert_eq!(a, b);
    }

    #[test]
    fn test_matching_tags_from_keywords() {
        let tags = matching_tags(&set(&["attendance", "semester"]));
        assert!(tags.contains(&Category::Rule));
        assert!(tags.contains(&Category::Syllabus));
        assert!(!tags.contains(&Category::Exam));
    }

    #[test]
    fn test_general_category_has_no_tag_keywords() {
        assert!(category_tag_keywords(Category::General).is_empty());
    }
}
