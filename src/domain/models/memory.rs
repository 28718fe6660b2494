//! Memory entry domain model.
//!
//! Namespaced key/value persistence with TTL and tag indexing. The
//! (namespace, key) pair is unique; values are JSON.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default namespace for operations that do not specify one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// A single namespaced key/value entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub namespace: String,
    pub key: String,
    pub value: serde_json::Value,
    pub tags: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            key: key.into(),
            value,
            tags: Vec::new(),
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set `expires_at = now + ttl_secs`.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let ttl = Duration::seconds(ttl_secs as i64);
        self.expires_at = Some(Utc::now() + ttl);
        self
    }

    /// Entries past their expiry are logically absent until collected.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|e| e < Utc::now())
    }

    /// Any-of (default) or all-of tag matching.
    pub fn matches_tags(&self, tags: &[String], all: bool) -> bool {
        if tags.is_empty() {
            return true;
        }
        if all {
            tags.iter().all(|t| self.tags.contains(t))
        } else {
            tags.iter().any(|t| self.tags.contains(t))
        }
    }
}

/// Filter criteria for list and search operations.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub namespace: Option<String>,
    /// Glob pattern over keys; `*` is the only wildcard.
    pub pattern: Option<String>,
    pub tags: Vec<String>,
    /// When true, tag matching requires all tags instead of any.
    pub all_tags: bool,
    pub limit: Option<usize>,
}

impl MemoryQuery {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Aggregate counters for `memory stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub namespaces: usize,
    pub expired_entries: usize,
}

/// Match a key against a glob pattern where `*` matches any run of
/// characters. Patterns without `*` require an exact match.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ended with '*'
    true
}
