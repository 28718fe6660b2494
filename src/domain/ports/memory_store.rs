//! Memory store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{MemoryEntry, MemoryQuery, MemoryStats};

/// Namespaced key/value store with TTL and tag filtering.
///
/// Expired entries are logically absent: reads miss, listings exclude
/// them. `cleanup` physically removes them.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or replace the entry at (namespace, key).
    async fn store(&self, entry: MemoryEntry) -> DomainResult<()>;

    /// Atomic multi-entry insert.
    async fn store_many(&self, entries: Vec<MemoryEntry>) -> DomainResult<()>;

    /// Fails with `MemoryNotFound` on a miss or an expired key.
    async fn retrieve(&self, key: &str, namespace: &str) -> DomainResult<MemoryEntry>;

    /// Entries matching the query, in insertion order.
    async fn list(&self, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>>;

    async fn delete(&self, key: &str, namespace: &str) -> DomainResult<()>;

    /// Glob search over keys, scoped by the query's namespace and tags.
    async fn search(&self, pattern: &str, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>>;

    /// Physically remove expired entries; returns the count removed.
    async fn cleanup(&self) -> DomainResult<u64>;

    /// Remove every entry in a namespace; returns the count removed.
    async fn clear_namespace(&self, namespace: &str) -> DomainResult<u64>;

    async fn stats(&self) -> DomainResult<MemoryStats>;
}
