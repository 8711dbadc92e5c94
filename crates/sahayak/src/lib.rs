//! Tiered knowledge-base matching and chat routing for a college help desk.
//!
//! Queries run through four tiers in strict order: keyword co-occurrence
//! patterns, weighted relevance scoring, external semantic matching over a
//! bounded candidate list, and finally generative fallback. The first tier
//! that produces an acceptable answer terminates the pipeline.

pub mod chat;
pub mod config;
pub mod kb;
pub mod llm;
pub mod matching;
pub mod text;
pub mod types;

// Re-export primary types for convenience
pub use chat::{AnswerSource, ChatReply, ChatRouter, ChatTurn, HistorySink, InMemoryHistory};
pub use config::RouterConfig;
pub use kb::{InMemoryKnowledgeStore, KbCache, KbCacheStats, KnowledgeStore};
pub use types::{CachedEntry, Category, Confidence, IntentClass, IntentResult, KnowledgeEntry};

// Re-export LLM types
pub use llm::{
    GeminiProvider, IntentClassifier, LanguageModel, LlmError, LlmRequest, QuotaGuard,
    SemanticMatcher,
};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
