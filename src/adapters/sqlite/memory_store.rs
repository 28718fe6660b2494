//! SQLite implementation of the MemoryStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MemoryEntry, MemoryQuery, MemoryStats};
use crate::domain::ports::MemoryStore;

#[derive(Clone)]
pub struct SqliteMemoryStore {
    pool: SqlitePool,
}

impl SqliteMemoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn upsert_query() -> &'static str {
        r#"INSERT INTO memory_entries (namespace, key, value, tags, expires_at, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(namespace, key) DO UPDATE SET
               value = excluded.value,
               tags = excluded.tags,
               expires_at = excluded.expires_at,
               updated_at = excluded.updated_at"#
    }

    async fn fetch_filtered(&self, query: &MemoryQuery) -> DomainResult<Vec<MemoryEntry>> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut sql = String::from(
            "SELECT * FROM memory_entries WHERE (expires_at IS NULL OR expires_at >= ?)",
        );
        let mut bindings: Vec<String> = vec![now];

        if let Some(ns) = &query.namespace {
            sql.push_str(" AND namespace = ?");
            bindings.push(ns.clone());
        }
        if let Some(pattern) = &query.pattern {
            sql.push_str(" AND key LIKE ?");
            bindings.push(pattern.replace('*', "%"));
        }

        sql.push_str(" ORDER BY created_at, key");

        let mut q = sqlx::query_as::<_, MemoryRow>(&sql);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<MemoryRow> = q.fetch_all(&self.pool).await?;
        let mut entries: Vec<MemoryEntry> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<DomainResult<_>>()?;

        // Tag filters are evaluated here; tags are stored as a JSON array.
        if !query.tags.is_empty() {
            entries.retain(|e| e.matches_tags(&query.tags, query.all_tags));
        }
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }

        Ok(entries)
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn store(&self, entry: MemoryEntry) -> DomainResult<()> {
        let value_json = serde_json::to_string(&entry.value)?;
        let tags_json = serde_json::to_string(&entry.tags)?;

        sqlx::query(Self::upsert_query())
            .bind(&entry.namespace)
            .bind(&entry.key)
            .bind(&value_json)
            .bind(&tags_json)
            .bind(entry.expires_at.map(|t| t.to_rfc3339()))
            .bind(entry.created_at.to_rfc3339())
            .bind(entry.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn store_many(&self, entries: Vec<MemoryEntry>) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        for entry in &entries {
            let value_json = serde_json::to_string(&entry.value)?;
            let tags_json = serde_json::to_string(&entry.tags)?;

            sqlx::query(Self::upsert_query())
                .bind(&entry.namespace)
                .bind(&entry.key)
                .bind(&value_json)
                .bind(&tags_json)
                .bind(entry.expires_at.map(|t| t.to_rfc3339()))
                .bind(entry.created_at.to_rfc3339())
                .bind(entry.updated_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn retrieve(&self, key: &str, namespace: &str) -> DomainResult<MemoryEntry> {
        let row: Option<MemoryRow> =
            sqlx::query_as("SELECT * FROM memory_entries WHERE namespace = ? AND key = ?")
                .bind(namespace)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let entry: MemoryEntry = row
            .ok_or_else(|| DomainError::MemoryNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })?
            .try_into()?;

        // Expired entries are logically absent until collected.
        if entry.is_expired() {
            return Err(DomainError::MemoryNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }

        Ok(entry)
    }

    async fn list(&self, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>> {
        self.fetch_filtered(&query).await
    }

    async fn delete(&self, key: &str, namespace: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM memory_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MemoryNotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }

        Ok(())
    }

    async fn search(&self, pattern: &str, query: MemoryQuery) -> DomainResult<Vec<MemoryEntry>> {
        let query = MemoryQuery {
            pattern: Some(pattern.to_string()),
            ..query
        };
        self.fetch_filtered(&query).await
    }

    async fn cleanup(&self) -> DomainResult<u64> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "DELETE FROM memory_entries WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn clear_namespace(&self, namespace: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM memory_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> DomainResult<MemoryStats> {
        let now = chrono::Utc::now().to_rfc3339();
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memory_entries")
            .fetch_one(&self.pool)
            .await?;
        let (namespaces,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT namespace) FROM memory_entries")
                .fetch_one(&self.pool)
                .await?;
        let (expired,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memory_entries WHERE expires_at IS NOT NULL AND expires_at < ?",
        )
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        #[allow(clippy::cast_sign_loss)]
        Ok(MemoryStats {
            total_entries: total as usize,
            namespaces: namespaces as usize,
            expired_entries: expired as usize,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    namespace: String,
    key: String,
    value: String,
    tags: String,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MemoryRow> for MemoryEntry {
    type Error = DomainError;

    fn try_from(row: MemoryRow) -> Result<Self, Self::Error> {
        Ok(MemoryEntry {
            namespace: row.namespace,
            key: row.key,
            value: serde_json::from_str(&row.value)?,
            tags: serde_json::from_str(&row.tags)?,
            expires_at: super::parse_optional_datetime(row.expires_at)?,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use serde_json::json;

    async fn setup() -> SqliteMemoryStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteMemoryStore::new(pool)
    }

    #[tokio::test]
    async fn test_store_retrieve_roundtrip() {
        let store = setup().await;
        let entry = MemoryEntry::new("config", json!({ "theme": "dark" }))
            .with_namespace("settings");

        store.store(entry).await.unwrap();

        let loaded = store.retrieve("config", "settings").await.unwrap();
        assert_eq!(loaded.value, json!({ "theme": "dark" }));
    }

    #[tokio::test]
    async fn test_retrieve_miss_is_not_found() {
        let store = setup().await;
        let err = store.retrieve("missing", "default").await.unwrap_err();
        assert!(matches!(err, DomainError::MemoryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let store = setup().await;
        store.store(MemoryEntry::new("k", json!(1))).await.unwrap();
        store.store(MemoryEntry::new("k", json!(2))).await.unwrap();

        let loaded = store.retrieve("k", "default").await.unwrap();
        assert_eq!(loaded.value, json!(2));
    }

    #[tokio::test]
    async fn test_pattern_list_insertion_order() {
        let store = setup().await;
        for key in ["api/user", "api/product", "config/settings"] {
            store.store(MemoryEntry::new(key, json!(key))).await.unwrap();
        }

        let entries = store
            .list(MemoryQuery::in_namespace("default").with_pattern("api/*"))
            .await
            .unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["api/user", "api/product"]);
    }

    #[tokio::test]
    async fn test_expired_entries_invisible_until_cleanup() {
        let store = setup().await;
        let mut entry = MemoryEntry::new("ephemeral", json!("x"));
        entry.expires_at = Some(chrono::Utc::now() - chrono::Duration::seconds(5));
        store.store(entry).await.unwrap();

        assert!(store.retrieve("ephemeral", "default").await.is_err());
        assert!(store.list(MemoryQuery::default()).await.unwrap().is_empty());

        let removed = store.cleanup().await.unwrap();
        assert_eq!(removed, 1);
        // Idempotent on empty.
        assert_eq!(store.cleanup().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tag_filtering() {
        let store = setup().await;
        store
            .store(MemoryEntry::new("a", json!(1)).with_tags(vec!["api".into(), "v2".into()]))
            .await
            .unwrap();
        store
            .store(MemoryEntry::new("b", json!(2)).with_tags(vec!["config".into()]))
            .await
            .unwrap();

        let any = store
            .list(MemoryQuery::default().with_tags(vec!["api".into(), "config".into()]))
            .await
            .unwrap();
        assert_eq!(any.len(), 2);

        let all = store
            .list(MemoryQuery {
                tags: vec!["api".into(), "v2".into()],
                all_tags: true,
                ..MemoryQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key, "a");
    }

    #[tokio::test]
    async fn test_store_many_is_atomic_and_stats() {
        let store = setup().await;
        store
            .store_many(vec![
                MemoryEntry::new("a", json!(1)).with_namespace("ns1"),
                MemoryEntry::new("b", json!(2)).with_namespace("ns2"),
            ])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.namespaces, 2);
    }

    #[tokio::test]
    async fn test_clear_namespace() {
        let store = setup().await;
        store
            .store(MemoryEntry::new("a", json!(1)).with_namespace("scratch"))
            .await
            .unwrap();
        store.store(MemoryEntry::new("b", json!(2))).await.unwrap();

        assert_eq!(store.clear_namespace("scratch").await.unwrap(), 1);
        assert!(store.retrieve("b", "default").await.is_ok());
    }
}
