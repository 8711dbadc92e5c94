//! Materialized cache of approved KB entries.
//!
//! Every approved record is enriched into a [`CachedEntry`] (normalized text,
//! keyword sets, category tags, compiled pattern) so the matching tiers never
//! touch the store on the hot path. Rebuilds are wholesale: correctness over
//! micro-optimization. Readers always see either the previous snapshot or the
//! fully rebuilt one, never a partial state.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;

use crate::matching::pattern::build_entry_pattern;
use crate::text::{extract_keywords, normalize_text, synonyms};
use crate::types::{CachedEntry, KnowledgeEntry};

use super::KnowledgeStore;

/// Shared snapshot type: cloned cheaply by every reader.
pub type CacheSnapshot = Arc<Vec<CachedEntry>>;

pub struct KbCache {
    store: Arc<dyn KnowledgeStore>,
    /// How many top keywords feed each entry's compiled pattern.
    max_pattern_keywords: usize,
    /// Last published snapshot. `None` means stale: the next read rebuilds.
    snapshot: RwLock<Option<CacheSnapshot>>,
    /// Serializes rebuilds; readers of `snapshot` are never blocked by it.
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl KbCache {
    pub fn new(store: Arc<dyn KnowledgeStore>, max_pattern_keywords: usize) -> Self {
        Self {
            store,
            max_pattern_keywords,
            snapshot: RwLock::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current snapshot, building lazily on first access or after
    /// invalidation. Concurrent callers waiting on an in-flight rebuild reuse
    /// its result instead of rebuilding again.
    pub async fn snapshot(&self) -> Result<CacheSnapshot> {
        if let Some(current) = self.snapshot.read().clone() {
            return Ok(current);
        }
        let _guard = self.rebuild_lock.lock().await;
        if let Some(current) = self.snapshot.read().clone() {
            return Ok(current);
        }
        self.rebuild_locked().await
    }

    /// Force a rebuild regardless of staleness.
    pub async fn rebuild(&self) -> Result<CacheSnapshot> {
        let _guard = self.rebuild_lock.lock().await;
        self.rebuild_locked().await
    }

    /// Mutation hook: any create/update/delete touching an approved entry
    /// (including approval state transitions) must call this before the next
    /// read is expected to see the change.
    pub fn invalidate(&self) {
        *self.snapshot.write() = None;
        tracing::debug!("knowledge cache invalidated");
    }

    async fn rebuild_locked(&self) -> Result<CacheSnapshot> {
        let entries = self.store.approved_entries().await?;
        let mut cached = Vec::with_capacity(entries.len());
        for entry in &entries {
            cached.push(enrich_entry(entry, self.max_pattern_keywords));
        }
        let snapshot: CacheSnapshot = Arc::new(cached);
        *self.snapshot.write() = Some(snapshot.clone());
        tracing::info!(entries = snapshot.len(), "knowledge cache rebuilt");
        Ok(snapshot)
    }

    /// Aggregate statistics over the current cache, for hosts exposing an
    /// admin or diagnostics view.
    pub async fn stats(&self) -> Result<KbCacheStats> {
        let snapshot = self.snapshot().await?;
        let mut by_category: HashMap<String, usize> = HashMap::new();
        let mut total_keywords = 0usize;
        for entry in snapshot.iter() {
            *by_category.entry(entry.category.as_str().to_string()).or_default() += 1;
            total_keywords += entry.keywords.len();
        }
        let total_entries = snapshot.len();
        Ok(KbCacheStats {
            total_entries,
            by_category,
            total_keywords,
            avg_keywords_per_entry: if total_entries > 0 {
                total_keywords as f32 / total_entries as f32
            } else {
                0.0
            },
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KbCacheStats {
    pub total_entries: usize,
    pub by_category: HashMap<String, usize>,
    pub total_keywords: usize,
    pub avg_keywords_per_entry: f32,
}

/// Enrich one approved entry: normalize, extract and expand keywords,
/// derive category tags, compile the co-occurrence pattern. An entry whose
/// text yields no keywords still gets cached (scoreable by phrase
/// containment), just without a pattern.
pub(crate) fn enrich_entry(entry: &KnowledgeEntry, max_pattern_keywords: usize) -> CachedEntry {
    let question_keywords = extract_keywords(&entry.question);
    let answer_keywords = extract_keywords(&entry.answer);
    let keywords: std::collections::HashSet<String> =
        question_keywords.union(&answer_keywords).cloned().collect();
    let expanded_keywords = synonyms::expand_keywords(&keywords);

    let mut tags = synonyms::matching_tags(&keywords);
    tags.insert(entry.category);

    let pattern = build_entry_pattern(&keywords, max_pattern_keywords);

    CachedEntry {
        id: entry.id,
        question: entry.question.clone(),
        answer: entry.answer.clone(),
        normalized_question: normalize_text(&entry.question),
        normalized_answer: normalize_text(&entry.answer),
        category: entry.category,
        keywords,
        expanded_keywords,
        tags,
        pattern,
    }
}
