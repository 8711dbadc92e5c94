//! External language model access.
//!
//! Everything AI-shaped goes through the narrow [`LanguageModel`] contract:
//! text in, text out, with errors classified just finely enough for the
//! router to tell "back off" (rate limit) apart from "degrade to the next
//! tier" (everything else).

pub mod gemini;
pub mod intent;
pub mod quota;
pub mod semantic;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiProvider;
pub use intent::IntentClassifier;
pub use quota::QuotaGuard;
pub use semantic::{SemanticMatch, SemanticMatcher};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("language model not configured")]
    NotConfigured,
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub role: ChatRole,
    pub text: String,
}

/// A single synchronous round trip to the external model.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_instruction: Option<String>,
    pub user_text: String,
    /// Prior turns, oldest first, replayed as role-tagged message pairs.
    pub history: Vec<HistoryMessage>,
    pub max_output_tokens: usize,
}

impl LlmRequest {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            max_output_tokens: 1024,
            ..Default::default()
        }
    }

    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_tokens(mut self, max_output_tokens: usize) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}

/// Core contract for external model providers.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// Response cleanup helpers
// ---------------------------------------------------------------------------

/// Strip markdown code fences the model sometimes wraps JSON in.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Best-effort extraction of the first balanced JSON object embedded in
/// model output ("Here you go: {...} hope that helps").
pub(crate) fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Rate-limit detection
// ---------------------------------------------------------------------------

static RETRY_DELAY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#""retryDelay"\s*:\s*"(\d+)"#).expect("retry delay regex is valid")
});
static RETRY_AFTER_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)retry (?:after|in) (\d+)").expect("retry after regex is valid")
});

/// Classify a provider error as rate limiting when the status or body
/// carries a quota signature, extracting the advertised retry delay when one
/// is present.
pub(crate) fn detect_rate_limit(status: Option<u16>, body: &str) -> Option<LlmError> {
    let lowered = body.to_lowercase();
    let looks_limited = status == Some(429)
        || lowered.contains("resource_exhausted")
        || lowered.contains("resource exhausted")
        || lowered.contains("quota");
    if !looks_limited {
        return None;
    }

    let retry_after = RETRY_DELAY_RE
        .captures(body)
        .or_else(|| RETRY_AFTER_RE.captures(body))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs);

    Some(LlmError::RateLimited { retry_after })
}
