//! Chat turns, reply envelope, and the conversation-history sink.

pub mod router;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::IntentResult;

pub use router::ChatRouter;

/// Which tier produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    KbMatch,
    AiFallback,
    Error,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KbMatch => "kb_match",
            Self::AiFallback => "ai_fallback",
            Self::Error => "error",
        }
    }
}

/// Provenance metadata persisted alongside every answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDetails {
    /// Pipeline tier that terminated the query ("pattern_match",
    /// "score_match", "semantic_match", "generative_fallback").
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One routed query and its answer. Immutable after creation; handed to the
/// history sink exactly once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub session: Option<String>,
    pub query: String,
    pub answer: String,
    pub source: AnswerSource,
    /// 0–100.
    pub confidence_score: f32,
    pub details: SourceDetails,
    pub timestamp: DateTime<Utc>,
}

/// What the router hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub source: AnswerSource,
    pub confidence_score: f32,
    pub details: SourceDetails,
}

/// Persistence of chat turns and retrieval of recent context. The real sink
/// lives outside the core; [`InMemoryHistory`] covers tests and small
/// deployments.
pub trait HistorySink: Send + Sync {
    fn record(&self, turn: ChatTurn);

    /// The most recent turns for a session, oldest first, capped at `limit`.
    fn recent(&self, session: Option<&str>, limit: usize) -> Vec<ChatTurn>;
}

#[derive(Default)]
pub struct InMemoryHistory {
    turns: RwLock<Vec<ChatTurn>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }

    pub fn all(&self) -> Vec<ChatTurn> {
        self.turns.read().clone()
    }
}

impl HistorySink for InMemoryHistory {
    fn record(&self, turn: ChatTurn) {
        self.turns.write().push(turn);
    }

    fn recent(&self, session: Option<&str>, limit: usize) -> Vec<ChatTurn> {
        let turns = self.turns.read();
        let mut matching: Vec<ChatTurn> = turns
            .iter()
            .filter(|turn| turn.session.as_deref() == session)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit);
        matching.drain(..skip);
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(session: Option<&str>, query: &str) -> ChatTurn {
        ChatTurn {
            id: Uuid::new_v4(),
            session: session.map(str::to_string),
            query: query.to_string(),
            answer: format!("answer to {query}"),
            source: AnswerSource::KbMatch,
            confidence_score: 90.0,
            details: SourceDetails::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_recent_filters_by_session() {
        let history = InMemoryHistory::new();
        history.record(turn(Some("s1"), "q1"));
        history.record(turn(Some("s2"), "q2"));
        history.record(turn(Some("s1"), "q3"));

        let recent = history.recent(Some("s1"), 10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "q1");
        assert_eq!(recent[1].query, "q3");
        assert!(history.recent(Some("s3"), 10).is_empty());
    }

    #[test]
    fn test_recent_keeps_the_latest_turns_oldest_first() {
        let history = InMemoryHistory::new();
        for i in 0..5 {
            history.record(turn(None, &format!("q{i}")));
        }
        let recent = history.recent(None, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].query, "q3");
        assert_eq!(recent[1].query, "q4");
    }

    #[test]
    fn test_source_round_trips_snake_case() {
        let json = serde_json::to_string(&AnswerSource::AiFallback).unwrap();
        assert_eq!(json, "\"ai_fallback\"");
        assert_eq!(AnswerSource::KbMatch.as_str(), "kb_match");
    }
}
