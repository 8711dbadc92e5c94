use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Knowledge base records
// ---------------------------------------------------------------------------

/// Topical category assigned by the administrative store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Rule,
    Syllabus,
    Exam,
    Faq,
    General,
}

impl Category {
    /// Conversion point for hosts loading records out of an external
    /// administrative store, where categories arrive as free-form labels.
    /// Unknown labels map to `General` rather than failing the whole record.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "rule" | "rules" => Self::Rule,
            "syllabus" => Self::Syllabus,
            "exam" | "exams" => Self::Exam,
            "faq" => Self::Faq,
            _ => Self::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Syllabus => "syllabus",
            Self::Exam => "exam",
            Self::Faq => "faq",
            Self::General => "general",
        }
    }
}

/// A question/answer record as owned by the external administrative store.
/// The core only ever reads approved entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub category: Category,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeEntry {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, category: Category) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            answer: answer.into(),
            category,
            approved: false,
            created_at: Utc::now(),
        }
    }

    pub fn approved(mut self) -> Self {
        self.approved = true;
        self
    }
}

/// Enriched, queryable form of an approved entry, produced by the cache
/// rebuild. Regenerated wholesale whenever the underlying store changes.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub normalized_question: String,
    pub normalized_answer: String,
    pub category: Category,
    /// Meaningful tokens from question + answer (len > 2, stop words removed).
    pub keywords: HashSet<String>,
    /// `keywords` widened with domain synonyms.
    pub expanded_keywords: HashSet<String>,
    /// Category tags: the entry's own category plus any whose keyword list
    /// intersects the entry's keywords.
    pub tags: HashSet<Category>,
    /// Co-occurrence pattern over the entry's top keywords. `None` when the
    /// entry yields no usable keywords.
    pub pattern: Option<regex::Regex>,
}

impl CachedEntry {
    /// Short identifier used in model prompts and validated on the way back.
    pub fn short_id(&self) -> String {
        let full = self.id.simple().to_string();
        format!("KB_{}", &full[..8])
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Coarse confidence bucket derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Bucket a 0–100 score: HIGH >= 70, MEDIUM >= 40, else LOW.
    pub fn from_percent(score: f32) -> Self {
        if score >= 70.0 {
            Self::High
        } else if score >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::High | Self::Medium)
    }
}

/// A KB entry under consideration for a query, with its provisional score.
#[derive(Debug, Clone)]
pub struct MatchCandidate<'a> {
    pub entry: &'a CachedEntry,
    pub score: f32,
    pub confidence: Confidence,
}

// ---------------------------------------------------------------------------
// Intent classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentClass {
    CollegeSpecific,
    General,
}

/// Outcome of the binary intent gate. Mirrors the strict JSON contract the
/// external model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent_type: IntentClass,
    pub confidence: Confidence,
}

impl IntentResult {
    /// Conservative default under quota exhaustion or any classification
    /// failure: assume the question needs the knowledge base so the KB tiers
    /// keep their chance, rather than skipping straight to the generative
    /// fallback.
    pub fn conservative_default() -> Self {
        Self {
            intent_type: IntentClass::CollegeSpecific,
            confidence: Confidence::Low,
        }
    }
}
