//! Binary intent gate: does this question need the college knowledge base?
//!
//! One short external call with a strict JSON contract. Every failure path —
//! quota exhausted, transport error, unparseable output — lands on the
//! conservative default (`COLLEGE_SPECIFIC` / `LOW`) so KB matching keeps
//! its chance instead of silently skipping to the generative fallback.

use std::sync::Arc;

use crate::types::{IntentClass, IntentResult};

use super::{extract_json_object, strip_code_fences, LanguageModel, LlmRequest, QuotaGuard};

const INTENT_MAX_TOKENS: usize = 64;

const INTENT_SYSTEM_PROMPT: &str = r#"You are an intent classification engine inside a college assistant. Decide whether the user's question requires institution-specific knowledge.

COLLEGE_SPECIFIC: college rules, attendance, dress code, syllabus, subjects, credits, exams, internal marks, timetable, departments, faculty, procedures, or anything stored in the college knowledge base.
GENERAL: general knowledge, programming or technology questions, greetings, casual messages, entertainment, anything unrelated to this institution.

Do not answer the question. Return ONLY valid JSON, no explanations, no markdown:

{"intent_type": "COLLEGE_SPECIFIC" | "GENERAL", "confidence": "HIGH" | "MEDIUM" | "LOW"}"#;

pub struct IntentClassifier {
    model: Arc<dyn LanguageModel>,
    quota: Arc<QuotaGuard>,
}

impl IntentClassifier {
    pub fn new(model: Arc<dyn LanguageModel>, quota: Arc<QuotaGuard>) -> Self {
        Self { model, quota }
    }

    /// Classify a query. Never fails: any problem yields the conservative
    /// default.
    pub async fn classify(&self, query: &str) -> IntentResult {
        if self.quota.is_exhausted() {
            tracing::debug!("quota exhausted, skipping intent classification");
            return IntentResult::conservative_default();
        }

        let request = LlmRequest::new(query)
            .with_system(INTENT_SYSTEM_PROMPT)
            .with_max_tokens(INTENT_MAX_TOKENS);

        match self.model.generate(&request).await {
            Ok(raw) => {
                let result = parse_intent_response(&raw);
                tracing::debug!(
                    intent = ?result.intent_type,
                    confidence = ?result.confidence,
                    "intent classified"
                );
                result
            }
            Err(e) => {
                if self.quota.mark_exhausted_from_error(&e) {
                    tracing::warn!("intent classification hit the provider quota");
                } else {
                    tracing::warn!(error = %e, "intent classification failed, using default");
                }
                IntentResult::conservative_default()
            }
        }
    }
}

/// Parse the model's JSON response. Strict parse first, then a substring
/// fallback, then the conservative default.
fn parse_intent_response(raw: &str) -> IntentResult {
    let cleaned = strip_code_fences(raw);
    let json_str = extract_json_object(cleaned).unwrap_or(cleaned);

    if let Ok(result) = serde_json::from_str::<IntentResult>(json_str) {
        return result;
    }

    // Lenient fallback: the intent label usually survives even when the
    // surrounding JSON does not.
    let lowered = cleaned.to_lowercase();
    if lowered.contains("college_specific") {
        return IntentResult {
            intent_type: IntentClass::CollegeSpecific,
            confidence: crate::types::Confidence::Medium,
        };
    }
    if lowered.contains("general") {
        return IntentResult {
            intent_type: IntentClass::General,
            confidence: crate::types::Confidence::Medium,
        };
    }

    IntentResult::conservative_default()
}
