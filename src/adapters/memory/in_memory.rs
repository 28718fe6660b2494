//! In-memory MemoryStore backend.
//!
//! Used as the fallback when the durable backend cannot be opened, and
//! unconditionally under test mode. Nothing survives the process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{glob_match, MemoryEntry, MemoryQuery, MemoryStats};
use crate::domain::ports::MemoryStore;

/// Keyed by (namespace, insertion sequence) so listings preserve
/// insertion order like the durable backend.
#[derive(Default)]
struct Inner {
    entries: BTreeMap<u64, MemoryEntry>,
    next_seq: u64,
}

impl Inner {
    fn find_seq(&self, namespace: &str, key: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(_, e)| e.namespace == namespace && e.key == key)
            .map(|(seq, _)| *seq)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(entry: &MemoryEntry, query: &MemoryQuery) -> bool {
        if entry.is_expired() {
            return false;
        }
        if let Some(ns) = &query.namespace {
            if &entry.namespace != ns {
                return false;
            }
        }
        if let Some(pattern) = &query.pattern {
            if !glob_match(pattern, &entry.key) {
                return false;
            }
        }
        entry.matches_tags(&query.tags, query.all_tags)
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(&self, entry: MemoryEntry) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        // Upsert: an existing (namespace, key) keeps its insertion slot.
        if let Some(seq) = inner.find_seq(&entry.namespace, &entry.key) {
            inner.entries.insert(seq, entry);
        } else {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.entries.insert(seq, entry);
        }
        Ok(())
    }

    async fn store_many(&self, entries: Vec<MemoryEntry>) -> DomainResult<()> {
        for entry in entries {
            self.store(entry).await?;
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str, namespace: &str) -> DomainResult<MemoryEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .find(|e| e.namespace == namespace && e.key == key && !e.is_expired())
            .cloned()
            .ok_or_else(|| DomainError::MemoryNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    async fn list(&self, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>> {
        let inner = self.inner.read().await;
        let mut out: Vec<MemoryEntry> = inner
            .entries
            .values()
            .filter(|e| Self::matches(e, &query))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn delete(&self, key: &str, namespace: &str) -> DomainResult<()> {
        let mut inner = self.inner.write().await;
        match inner.find_seq(namespace, key) {
            Some(seq) => {
                inner.entries.remove(&seq);
                Ok(())
            }
            None => Err(DomainError::MemoryNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            }),
        }
    }

    async fn search(&self, pattern: &str, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>> {
        let query = MemoryQuery {
            pattern: Some(pattern.to_string()),
            ..query
        };
        self.list(query).await
    }

    async fn cleanup(&self) -> DomainResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired());
        Ok((before - inner.entries.len()) as u64)
    }

    async fn clear_namespace(&self, namespace: &str) -> DomainResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.namespace != namespace);
        Ok((before - inner.entries.len()) as u64)
    }

    async fn stats(&self) -> DomainResult<MemoryStats> {
        let inner = self.inner.read().await;
        let namespaces: std::collections::HashSet<&str> = inner
            .entries
            .values()
            .map(|e| e.namespace.as_str())
            .collect();
        let expired = inner.entries.values().filter(|e| e.is_expired()).count();

        Ok(MemoryStats {
            total_entries: inner.entries.len(),
            namespaces: namespaces.len(),
            expired_entries: expired,
        })
    }
}
