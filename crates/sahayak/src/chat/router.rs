//! Tiered query routing: pattern match, relevance scoring, semantic
//! matching, then generative fallback. The first tier that produces an
//! acceptable answer terminates the pipeline, and every invocation persists
//! exactly one turn to the history sink.

use std::sync::Arc;

use crate::chat::{AnswerSource, ChatReply, ChatTurn, HistorySink, SourceDetails};
use crate::config::RouterConfig;
use crate::kb::cache::{CacheSnapshot, KbCache};
use crate::llm::{
    ChatRole, HistoryMessage, IntentClassifier, LanguageModel, LlmRequest, QuotaGuard,
    SemanticMatcher,
};
use crate::matching::{best_pattern_match, rank_candidates, QueryFeatures};
use crate::types::{CachedEntry, Confidence, IntentClass, IntentResult};
use chrono::Utc;
use uuid::Uuid;

const EMPTY_QUERY_MESSAGE: &str = "Please provide a question.";

const UNAVAILABLE_MESSAGE: &str = "The assistant is handling a lot of requests right now. \
Please try again in a little while, or reach the college office directly for anything urgent.";

const COLLEGE_SYSTEM_PROMPT: &str = "You are a helpful assistant for a college help desk. \
Answer questions about the college clearly and briefly. If the question concerns specific \
college data you do not have (fees, dates, staff contacts), say so and suggest contacting \
the college office instead of guessing.";

const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful assistant for students at a college \
help desk. Answer general questions clearly and briefly. Stay factual and keep answers \
appropriate for an academic setting.";

/// The routing engine. Owns the tier components and a handle to the history
/// sink; stateless across queries apart from the shared quota guard.
pub struct ChatRouter {
    cache: Arc<KbCache>,
    model: Arc<dyn LanguageModel>,
    history: Arc<dyn HistorySink>,
    quota: Arc<QuotaGuard>,
    intent: IntentClassifier,
    semantic: SemanticMatcher,
    config: RouterConfig,
}

impl ChatRouter {
    pub fn new(
        cache: Arc<KbCache>,
        model: Arc<dyn LanguageModel>,
        history: Arc<dyn HistorySink>,
        quota: Arc<QuotaGuard>,
        config: RouterConfig,
    ) -> Self {
        let intent = IntentClassifier::new(Arc::clone(&model), Arc::clone(&quota));
        let semantic = SemanticMatcher::new(
            Arc::clone(&model),
            Arc::clone(&quota),
            config.semantic.max_output_tokens,
        );
        Self {
            cache,
            model,
            history,
            quota,
            intent,
            semantic,
            config,
        }
    }

    /// Route one query through the tiers and persist the resulting turn.
    pub async fn respond(&self, raw_query: &str, session: Option<&str>) -> ChatReply {
        let query = raw_query.trim();
        if query.is_empty() {
            let details = SourceDetails {
                note: Some("empty query".to_string()),
                ..Default::default()
            };
            return self.finish(
                query,
                session,
                EMPTY_QUERY_MESSAGE.to_string(),
                AnswerSource::Error,
                0.0,
                details,
            );
        }

        let snapshot = match self.cache.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%error, "knowledge cache unavailable, KB tiers skipped");
                CacheSnapshot::default()
            }
        };

        // Tier 1: keyword co-occurrence patterns.
        if let Some(entry) = best_pattern_match(query, &snapshot) {
            tracing::info!(entry = %entry.id, "pattern tier matched");
            let score = self.config.thresholds.pattern_score;
            return self.finish_kb(query, session, entry, score, "pattern_match");
        }

        // Tier 2: weighted relevance scoring.
        let features = QueryFeatures::new(query);
        let candidates = rank_candidates(
            &features,
            &snapshot,
            self.config.thresholds.candidate_floor,
            self.config.semantic.candidate_cap,
        );
        if let Some(best) = candidates.first() {
            if best.score >= self.config.thresholds.score_accept && best.confidence.is_acceptable()
            {
                tracing::info!(entry = %best.entry.id, score = best.score, "score tier matched");
                let (entry, score) = (best.entry, best.score);
                return self.finish_kb(query, session, entry, score, "score_match");
            }
        }

        // Tier 3: semantic matching over the surviving candidates.
        if let Some(hit) = self.semantic.best_match(query, &candidates).await {
            if let Some(entry) = snapshot.iter().find(|entry| entry.id == hit.entry_id) {
                tracing::info!(entry = %entry.id, "semantic tier matched");
                let score = match hit.confidence {
                    Confidence::High => 85.0,
                    _ => 65.0,
                };
                return self.finish_kb(query, session, entry, score, "semantic_match");
            }
        }

        // Tier 4: generative fallback.
        self.generative_fallback(query, session).await
    }

    async fn generative_fallback(&self, query: &str, session: Option<&str>) -> ChatReply {
        let intent = self.intent.classify(query).await;
        let system = match intent.intent_type {
            IntentClass::CollegeSpecific => COLLEGE_SYSTEM_PROMPT,
            IntentClass::General => GENERAL_SYSTEM_PROMPT,
        };

        if self.quota.is_exhausted() {
            tracing::warn!("quota exhausted, generative fallback skipped");
            return self.finish_unavailable(query, session, intent, "quota exhausted");
        }

        let context: Vec<HistoryMessage> = self
            .history
            .recent(session, self.config.fallback.history_window)
            .into_iter()
            .flat_map(|turn| {
                [
                    HistoryMessage {
                        role: ChatRole::User,
                        text: turn.query,
                    },
                    HistoryMessage {
                        role: ChatRole::Model,
                        text: turn.answer,
                    },
                ]
            })
            .collect();

        let request = LlmRequest::new(query)
            .with_system(system)
            .with_history(context)
            .with_max_tokens(self.config.fallback.max_output_tokens);

        match self.model.generate(&request).await {
            Ok(answer) => {
                let details = SourceDetails {
                    tier: Some("generative_fallback".to_string()),
                    intent: Some(intent),
                    ..Default::default()
                };
                self.finish(query, session, answer, AnswerSource::AiFallback, 50.0, details)
            }
            Err(error) => {
                self.quota.mark_exhausted_from_error(&error);
                tracing::warn!(%error, "generative fallback failed");
                self.finish_unavailable(query, session, intent, &error.to_string())
            }
        }
    }

    fn finish_kb(
        &self,
        query: &str,
        session: Option<&str>,
        entry: &CachedEntry,
        score: f32,
        tier: &str,
    ) -> ChatReply {
        let details = SourceDetails {
            tier: Some(tier.to_string()),
            matched_entry: Some(entry.id),
            matched_question: Some(entry.question.clone()),
            score: Some(score),
            ..Default::default()
        };
        self.finish(
            query,
            session,
            entry.answer.clone(),
            AnswerSource::KbMatch,
            score,
            details,
        )
    }

    fn finish_unavailable(
        &self,
        query: &str,
        session: Option<&str>,
        intent: IntentResult,
        note: &str,
    ) -> ChatReply {
        let details = SourceDetails {
            tier: Some("generative_fallback".to_string()),
            intent: Some(intent),
            note: Some(note.to_string()),
            ..Default::default()
        };
        self.finish(
            query,
            session,
            UNAVAILABLE_MESSAGE.to_string(),
            AnswerSource::Error,
            0.0,
            details,
        )
    }

    fn finish(
        &self,
        query: &str,
        session: Option<&str>,
        answer: String,
        source: AnswerSource,
        confidence_score: f32,
        details: SourceDetails,
    ) -> ChatReply {
        let turn = ChatTurn {
            id: Uuid::new_v4(),
            session: session.map(str::to_string),
            query: query.to_string(),
            answer: answer.clone(),
            source,
            confidence_score,
            details: details.clone(),
            timestamp: Utc::now(),
        };
        self.history.record(turn);
        ChatReply {
            answer,
            source,
            confidence_score,
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::InMemoryHistory;
    use crate::kb::InMemoryKnowledgeStore;
    use crate::llm::LlmError;
    use crate::types::{Category, KnowledgeEntry};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Plays back a fixed sequence of responses and counts calls. Running
    /// out of script is a transport error so accidental extra calls surface
    /// as assertion failures on the counter.
    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, _request: &LlmRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".to_string())))
        }
    }

    struct Fixture {
        router: ChatRouter,
        model: Arc<ScriptedModel>,
        history: Arc<InMemoryHistory>,
        cache: Arc<KbCache>,
    }

    async fn fixture(
        entries: Vec<KnowledgeEntry>,
        responses: Vec<Result<String, LlmError>>,
    ) -> Fixture {
        let store = Arc::new(InMemoryKnowledgeStore::new(entries));
        let config = RouterConfig::default();
        let cache = Arc::new(KbCache::new(store, config.pattern.max_keywords));
        let model = Arc::new(ScriptedModel::new(responses));
        let history = Arc::new(InMemoryHistory::new());
        let quota = Arc::new(QuotaGuard::new(Duration::from_secs(
            config.quota.default_cooldown_secs,
        )));
        let router = ChatRouter::new(
            Arc::clone(&cache),
            Arc::clone(&model) as Arc<dyn LanguageModel>,
            Arc::clone(&history) as Arc<dyn HistorySink>,
            quota,
            config,
        );
        Fixture {
            router,
            model,
            history,
            cache,
        }
    }

    fn attendance_entry() -> KnowledgeEntry {
        KnowledgeEntry::new(
            "What is the minimum attendance required?",
            "75% attendance is mandatory in all subjects.",
            Category::Rule,
        )
        .approved()
    }

    fn warden_entry() -> KnowledgeEntry {
        KnowledgeEntry::new(
            "Who is the hostel warden?",
            "Mr. Sharma manages the hostel block.",
            Category::Faq,
        )
        .approved()
    }

    #[tokio::test]
    async fn test_pattern_tier_answers_without_external_calls() {
        let fx = fixture(vec![attendance_entry()], vec![]).await;

        let reply = fx.router.respond("is attendance compulsory", None).await;

        assert_eq!(reply.source, AnswerSource::KbMatch);
        assert_eq!(reply.answer, "75% attendance is mandatory in all subjects.");
        assert_eq!(reply.details.tier.as_deref(), Some("pattern_match"));
        assert_eq!(fx.model.calls(), 0);
        assert_eq!(fx.history.len(), 1);
    }

    #[tokio::test]
    async fn test_score_tier_answers_without_external_calls() {
        let fx = fixture(vec![attendance_entry()], vec![]).await;

        // Synonym-heavy phrasing that dodges the co-occurrence pattern but
        // still overlaps enough keywords to clear the scoring threshold.
        let reply = fx
            .router
            .respond("minimum percentage for classes", None)
            .await;

        assert_eq!(reply.source, AnswerSource::KbMatch);
        assert_eq!(reply.details.tier.as_deref(), Some("score_match"));
        assert!(reply.confidence_score >= 40.0);
        assert_eq!(fx.model.calls(), 0);
    }

    #[tokio::test]
    async fn test_semantic_tier_resolves_borderline_candidates() {
        let fx = fixture(vec![warden_entry()], vec![]).await;
        let snapshot = fx.cache.snapshot().await.unwrap();
        let short_id = snapshot[0].short_id();
        fx.model.responses.lock().push_back(Ok(format!(
            r#"{{"match_found": true, "kb_id": "{short_id}", "confidence": "HIGH"}}"#
        )));

        let reply = fx
            .router
            .respond("warden contact number please", None)
            .await;

        assert_eq!(reply.source, AnswerSource::KbMatch);
        assert_eq!(reply.answer, "Mr. Sharma manages the hostel block.");
        assert_eq!(reply.details.tier.as_deref(), Some("semantic_match"));
        assert_eq!(reply.confidence_score, 85.0);
        assert_eq!(fx.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_query_falls_back_to_generation() {
        let fx = fixture(
            vec![attendance_entry()],
            vec![
                Ok(r#"{"intent_type": "GENERAL", "confidence": "HIGH"}"#.to_string()),
                Ok("The library is open 9am to 8pm.".to_string()),
            ],
        )
        .await;

        let reply = fx.router.respond("library timings", Some("s1")).await;

        assert_eq!(reply.source, AnswerSource::AiFallback);
        assert_eq!(reply.answer, "The library is open 9am to 8pm.");
        assert_eq!(reply.details.tier.as_deref(), Some("generative_fallback"));
        assert_eq!(fx.model.calls(), 2);

        let turns = fx.history.recent(Some("s1"), 10);
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].source, AnswerSource::AiFallback);
    }

    #[tokio::test]
    async fn test_rate_limit_trips_guard_and_silences_later_calls() {
        let fx = fixture(
            vec![],
            vec![Err(LlmError::RateLimited {
                retry_after: Some(Duration::from_secs(120)),
            })],
        )
        .await;

        // First query: the intent call hits the rate limit, trips the guard,
        // and the generation call is skipped entirely.
        let reply = fx.router.respond("library timings", None).await;
        assert_eq!(reply.source, AnswerSource::Error);
        assert_eq!(reply.answer, UNAVAILABLE_MESSAGE);
        assert_eq!(fx.model.calls(), 1);

        // Second query inside the cooldown: no external calls at all.
        let reply = fx.router.respond("exam schedule updates", None).await;
        assert_eq!(reply.source, AnswerSource::Error);
        assert_eq!(fx.model.calls(), 1);
        assert_eq!(fx.history.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_and_persisted() {
        let fx = fixture(vec![attendance_entry()], vec![]).await;

        let reply = fx.router.respond("   ", None).await;

        assert_eq!(reply.source, AnswerSource::Error);
        assert_eq!(reply.answer, EMPTY_QUERY_MESSAGE);
        assert_eq!(fx.model.calls(), 0);
        assert_eq!(fx.history.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_replays_session_history() {
        let fx = fixture(
            vec![],
            vec![
                Ok(r#"{"intent_type": "GENERAL", "confidence": "HIGH"}"#.to_string()),
                Ok("First answer.".to_string()),
                Ok(r#"{"intent_type": "GENERAL", "confidence": "HIGH"}"#.to_string()),
                Ok("Second answer.".to_string()),
            ],
        )
        .await;

        fx.router.respond("first question", Some("s1")).await;
        fx.router.respond("second question", Some("s1")).await;

        assert_eq!(fx.model.calls(), 4);
        let turns = fx.history.recent(Some("s1"), 10);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].answer, "First answer.");
        assert_eq!(turns[1].answer, "Second answer.");
    }
}
