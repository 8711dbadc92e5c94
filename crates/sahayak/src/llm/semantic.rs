//! AI-assisted disambiguation over the scorer's top candidates.
//!
//! One external call decides whether any pre-filtered KB entry answers the
//! query by meaning rather than literal words. Strictly optional: skipped
//! under quota exhaustion or with no candidates, and every failure degrades
//! to "no match" so the router can move on to the generative fallback.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::types::{Confidence, MatchCandidate};

use super::{extract_json_object, strip_code_fences, LanguageModel, LlmRequest, QuotaGuard};

const SEMANTIC_SYSTEM_PROMPT: &str = r#"You match student questions against a college knowledge base. You are given a question and a numbered list of KB entries. Pick the single entry that answers the question by MEANING, not by literal word overlap, and respect the entry categories (a syllabus question should not match a fee rule).

Return ONLY valid JSON, no markdown:
{"match_found": true, "kb_id": "<id from the list>", "confidence": "HIGH" | "MEDIUM"}
or, if no entry clearly answers the question:
{"match_found": false}

Never guess. A partial or low-confidence match counts as no match."#;

/// A validated semantic hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticMatch {
    pub entry_id: Uuid,
    pub confidence: Confidence,
}

pub struct SemanticMatcher {
    model: Arc<dyn LanguageModel>,
    quota: Arc<QuotaGuard>,
    max_output_tokens: usize,
}

impl SemanticMatcher {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        quota: Arc<QuotaGuard>,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            model,
            quota,
            max_output_tokens,
        }
    }

    /// Ask the model for the best candidate. `None` means "no confident
    /// match" for any reason: empty candidates, quota exhausted, provider
    /// failure, unparseable output, or a hallucinated id.
    pub async fn best_match(
        &self,
        query: &str,
        candidates: &[MatchCandidate<'_>],
    ) -> Option<SemanticMatch> {
        if candidates.is_empty() {
            return None;
        }
        if self.quota.is_exhausted() {
            tracing::debug!("quota exhausted, skipping semantic matching");
            return None;
        }

        let listing: String = candidates
            .iter()
            .map(|candidate| {
                format!(
                    "[{}] ({}) {}",
                    candidate.entry.short_id(),
                    candidate.entry.category.as_str(),
                    candidate.entry.question
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let user_text = format!("Question: {query}\n\nKB entries:\n{listing}");

        let request = LlmRequest::new(user_text)
            .with_system(SEMANTIC_SYSTEM_PROMPT)
            .with_max_tokens(self.max_output_tokens);

        let raw = match self.model.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                if self.quota.mark_exhausted_from_error(&e) {
                    tracing::warn!("semantic matching hit the provider quota");
                } else {
                    tracing::warn!(error = %e, "semantic matching failed, falling through");
                }
                return None;
            }
        };

        parse_semantic_response(&raw, candidates)
    }
}

/// Wire shape of the model's verdict.
#[derive(Debug, Deserialize)]
struct SemanticVerdict {
    match_found: bool,
    #[serde(default)]
    kb_id: Option<String>,
    #[serde(default)]
    confidence: Option<Confidence>,
}

/// Parse and validate the verdict against the candidate list. Ids not in the
/// list are treated as no match — the model does occasionally invent them.
fn parse_semantic_response(
    raw: &str,
    candidates: &[MatchCandidate<'_>],
) -> Option<SemanticMatch> {
    let cleaned = strip_code_fences(raw);
    let json_str = extract_json_object(cleaned).unwrap_or(cleaned);

    let verdict: SemanticVerdict = match serde_json::from_str(json_str) {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!(
                error = %e,
                output = %cleaned.chars().take(200).collect::<String>(),
                "unparseable semantic verdict"
            );
            return None;
        }
    };

    if !verdict.match_found {
        return None;
    }
    let kb_id = verdict.kb_id?;
    let confidence = verdict.confidence.unwrap_or(Confidence::Low);
    if !confidence.is_acceptable() {
        return None;
    }

    let entry = candidates.iter().map(|c| c.entry).find(|entry| {
        entry.short_id() == kb_id || entry.id.to_string() == kb_id
    });
    match entry {
        Some(entry) => Some(SemanticMatch {
            entry_id: entry.id,
            confidence,
        }),
        None => {
            tracing::warn!(kb_id = %kb_id, "semantic verdict cited an unknown id, ignoring");
            None
        }
    }
}
