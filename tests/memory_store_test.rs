//! Memory store integration tests: round-trip laws, patterns, TTL,
//! namespaces, and the composite fallback.

mod common;

use common::Harness;
use serde_json::json;

use hivemind::adapters::memory::{ActiveBackend, CompositeMemoryStore};
use hivemind::adapters::sqlite::SqliteMemoryStore;
use hivemind::domain::errors::DomainError;
use hivemind::domain::models::{HiveConfig, MemoryEntry, MemoryQuery};
use hivemind::domain::ports::MemoryStore;

async fn store() -> (SqliteMemoryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path().join("sessions")).await;
    (SqliteMemoryStore::new(harness.pool.clone()), dir)
}

/// Round-trip law: store then retrieve returns the value, and the entry
/// appears in the namespace listing.
#[tokio::test]
async fn test_store_retrieve_list_law() {
    let (store, _dir) = store().await;

    let value = json!({ "endpoint": "/v2/users", "active": true });
    store
        .store(
            MemoryEntry::new("api-config", value.clone())
                .with_namespace("services")
                .with_tags(vec!["api".into()]),
        )
        .await
        .unwrap();

    let loaded = store.retrieve("api-config", "services").await.unwrap();
    assert_eq!(loaded.value, value);

    let listed = store
        .list(MemoryQuery::in_namespace("services"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].key, "api-config");
}

/// Pattern query scenario: `api/*` matches exactly the api-prefixed
/// keys, in insertion order.
#[tokio::test]
async fn test_pattern_query() {
    let (store, _dir) = store().await;

    for key in ["api/user", "api/product", "config/settings"] {
        store.store(MemoryEntry::new(key, json!(key))).await.unwrap();
    }

    let hits = store
        .search("api/*", MemoryQuery::in_namespace("default"))
        .await
        .unwrap();
    let keys: Vec<&str> = hits.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["api/user", "api/product"]);
}

/// TTL law: the value is readable before expiry and a miss after;
/// cleanup removes the row.
#[tokio::test]
async fn test_ttl_law() {
    let (store, _dir) = store().await;

    store
        .store(MemoryEntry::new("ephemeral", json!("v")).with_ttl(1))
        .await
        .unwrap();

    // Before expiry.
    assert_eq!(
        store.retrieve("ephemeral", "default").await.unwrap().value,
        json!("v")
    );

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let err = store.retrieve("ephemeral", "default").await.unwrap_err();
    assert!(matches!(err, DomainError::MemoryNotFound { .. }));

    assert_eq!(store.cleanup().await.unwrap(), 1);
    assert_eq!(store.cleanup().await.unwrap(), 0);
}

/// Namespace isolation: the same key lives independently per namespace.
#[tokio::test]
async fn test_namespace_isolation() {
    let (store, _dir) = store().await;

    store
        .store(MemoryEntry::new("k", json!("a")).with_namespace("ns-a"))
        .await
        .unwrap();
    store
        .store(MemoryEntry::new("k", json!("b")).with_namespace("ns-b"))
        .await
        .unwrap();

    assert_eq!(store.retrieve("k", "ns-a").await.unwrap().value, json!("a"));
    assert_eq!(store.retrieve("k", "ns-b").await.unwrap().value, json!("b"));

    store.delete("k", "ns-a").await.unwrap();
    assert!(store.retrieve("k", "ns-a").await.is_err());
    assert!(store.retrieve("k", "ns-b").await.is_ok());
}

/// The composite store falls back permanently to in-memory when the
/// durable backend cannot open, and operations keep working.
#[tokio::test]
async fn test_composite_fallback() {
    let config = HiveConfig {
        database: hivemind::domain::models::DatabaseConfig {
            path: "/dev/null/nope/hive.db".to_string(),
        },
        ..HiveConfig::default()
    };

    let store = CompositeMemoryStore::initialize(&config).await;
    assert_eq!(store.active_backend(), ActiveBackend::InMemory);

    store
        .store(MemoryEntry::new("volatile", json!(1)))
        .await
        .unwrap();
    assert_eq!(
        store.retrieve("volatile", "default").await.unwrap().value,
        json!(1)
    );
}

/// Tag queries: any-of by default, all-of with the flag.
#[tokio::test]
async fn test_tag_queries() {
    let (store, _dir) = store().await;

    store
        .store(
            MemoryEntry::new("both", json!(1))
                .with_tags(vec!["api".into(), "stable".into()]),
        )
        .await
        .unwrap();
    store
        .store(MemoryEntry::new("one", json!(2)).with_tags(vec!["api".into()]))
        .await
        .unwrap();

    let any = store
        .list(MemoryQuery::default().with_tags(vec!["api".into(), "stable".into()]))
        .await
        .unwrap();
    assert_eq!(any.len(), 2);

    let all = store
        .list(MemoryQuery {
            tags: vec!["api".into(), "stable".into()],
            all_tags: true,
            ..MemoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, "both");
}
