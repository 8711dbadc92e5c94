//! Knowledge base access.
//!
//! The administrative store owns the records; the core only reads approved
//! entries through the [`KnowledgeStore`] trait and reacts to mutations via
//! [`cache::KbCache::invalidate`].

pub mod cache;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::KnowledgeEntry;

pub use cache::{KbCache, KbCacheStats};

/// Read access to the externally-owned knowledge base.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// All approved entries, in no particular order.
    async fn approved_entries(&self) -> Result<Vec<KnowledgeEntry>>;
}

/// Simple in-process store. Useful for tests and for hosts that load the KB
/// from elsewhere and push it in. The host is responsible for calling
/// `KbCache::invalidate` after mutations, mirroring the save/delete
/// notification hook of a real store.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    entries: RwLock<Vec<KnowledgeEntry>>,
}

impl InMemoryKnowledgeStore {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Insert or replace by id.
    pub fn upsert(&self, entry: KnowledgeEntry) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn approved_entries(&self) -> Result<Vec<KnowledgeEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.approved)
            .cloned()
            .collect())
    }
}
