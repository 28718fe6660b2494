//! Composite memory store with a durable-first fallback policy.
//!
//! The durable SQLite backend is attempted once at startup. On failure
//! the store falls back to the in-memory backend for the remainder of
//! the process, with a single prominent warning; there is no automatic
//! re-promotion.

use std::sync::Arc;

use crate::adapters::memory::InMemoryStore;
use crate::adapters::sqlite::{self, SqliteMemoryStore};
use crate::domain::errors::DomainResult;
use crate::domain::models::{HiveConfig, MemoryBackendKind};
use crate::domain::ports::MemoryStore;

/// Which backend ended up active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBackend {
    Sqlite,
    InMemory,
}

pub struct CompositeMemoryStore {
    inner: Arc<dyn MemoryStore>,
    active: ActiveBackend,
}

impl CompositeMemoryStore {
    /// Initialize according to config. Test mode always selects the
    /// in-memory backend; otherwise the durable backend is tried first
    /// and the in-memory store is the permanent fallback.
    pub async fn initialize(config: &HiveConfig) -> Self {
        if config.test_mode {
            return Self::in_memory();
        }

        if config.memory.backend != MemoryBackendKind::Sqlite {
            // markdown/hybrid select the same composite; conflict
            // resolution is timestamp (latest updated_at wins).
            tracing::info!(
                backend = ?config.memory.backend,
                "Unsupported memory backend requested; using sqlite with timestamp resolution"
            );
        }

        let database_url = format!("sqlite:{}", config.database.path);
        match sqlite::initialize_database(&database_url).await {
            Ok(pool) => Self {
                inner: Arc::new(SqliteMemoryStore::new(pool)),
                active: ActiveBackend::Sqlite,
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Memory backend unavailable; falling back to in-memory store. \
                     Data will NOT persist across runs."
                );
                Self::in_memory()
            }
        }
    }

    /// Build directly over an already-open pool (shared with the
    /// coordinator's repositories).
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        Self {
            inner: Arc::new(SqliteMemoryStore::new(pool)),
            active: ActiveBackend::Sqlite,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemoryStore::new()),
            active: ActiveBackend::InMemory,
        }
    }

    pub fn active_backend(&self) -> ActiveBackend {
        self.active
    }

    pub fn backend(&self) -> Arc<dyn MemoryStore> {
        self.inner.clone()
    }
}

#[async_trait::async_trait]
impl MemoryStore for CompositeMemoryStore {
    async fn store(&self, entry: crate::domain::models::MemoryEntry) -> DomainResult<()> {
        self.inner.store(entry).await
    }

    async fn store_many(&self, entries: Vec<crate::domain::models::MemoryEntry>) -> DomainResult<()> {
        self.inner.store_many(entries).await
    }

    async fn retrieve(
        &self,
        key: &str,
        namespace: &str,
    ) -> DomainResult<crate::domain::models::MemoryEntry> {
        self.inner.retrieve(key, namespace).await
    }

    async fn list(
        &self,
        query: crate::domain::models::MemoryQuery,
    ) -> DomainResult<Vec<crate::domain::models::MemoryEntry>> {
        self.inner.list(query).await
    }

    async fn delete(&self, key: &str, namespace: &str) -> DomainResult<()> {
        self.inner.delete(key, namespace).await
    }

    async fn search(
        &self,
        pattern: &str,
        query: crate::domain::models::MemoryQuery,
    ) -> DomainResult<Vec<crate::domain::models::MemoryEntry>> {
        self.inner.search(pattern, query).await
    }

    async fn cleanup(&self) -> DomainResult<u64> {
        self.inner.cleanup().await
    }

    async fn clear_namespace(&self, namespace: &str) -> DomainResult<u64> {
        self.inner.clear_namespace(namespace).await
    }

    async fn stats(&self) -> DomainResult<crate::domain::models::MemoryStats> {
        self.inner.stats().await
    }
}
