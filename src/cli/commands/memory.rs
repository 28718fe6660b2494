//! Memory commands.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use serde::Serialize;
use std::path::Path;

use crate::cli::commands::{domain, AppContext, CommandResult};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{MemoryEntry, MemoryQuery, MemoryStats};

#[derive(Debug, Serialize)]
pub struct MemoryEntryOutput {
    pub namespace: String,
    pub key: String,
    pub value: serde_json::Value,
    pub tags: Vec<String>,
    pub expires_at: Option<String>,
}

impl From<&MemoryEntry> for MemoryEntryOutput {
    fn from(entry: &MemoryEntry) -> Self {
        Self {
            namespace: entry.namespace.clone(),
            key: entry.key.clone(),
            value: entry.value.clone(),
            tags: entry.tags.clone(),
            expires_at: entry.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl CommandOutput for MemoryEntryOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("{}/{}", self.namespace, self.key),
            format!("  value: {}", self.value),
        ];
        if !self.tags.is_empty() {
            lines.push(format!("  tags:  {}", self.tags.join(", ")));
        }
        if let Some(expires) = &self.expires_at {
            lines.push(format!("  expires: {expires}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct MemoryListOutput {
    pub entries: Vec<MemoryEntryOutput>,
    pub total: usize,
}

impl CommandOutput for MemoryListOutput {
    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No entries found.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["NAMESPACE", "KEY", "VALUE", "TAGS"]);
        for entry in &self.entries {
            table.add_row(vec![
                truncate(&entry.namespace, 16),
                truncate(&entry.key, 30),
                truncate(&entry.value.to_string(), 40),
                truncate(&entry.tags.join(","), 20),
            ]);
        }
        format!("{table}\n{} entr(ies)", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct CountOutput {
    pub count: u64,
    pub action: String,
}

impl CommandOutput for CountOutput {
    fn to_human(&self) -> String {
        format!("{} {} entr(ies)", self.action, self.count)
    }
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    #[serde(flatten)]
    pub stats: MemoryStats,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        format!(
            "Memory store: {} entries in {} namespace(s), {} expired pending cleanup",
            self.stats.total_entries, self.stats.namespaces, self.stats.expired_entries
        )
    }
}

/// Values are JSON when they parse as JSON, plain strings otherwise.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or(serde_json::Value::String(raw.to_string()))
}

pub async fn handle_store(
    ctx: &AppContext,
    key: String,
    value: String,
    namespace: String,
    tags: Vec<String>,
    ttl: Option<u64>,
    json: bool,
) -> CommandResult<()> {
    let mut entry = MemoryEntry::new(&key, parse_value(&value))
        .with_namespace(&namespace)
        .with_tags(tags);
    if let Some(ttl) = ttl {
        entry = entry.with_ttl(ttl);
    }

    domain(ctx.memory.store(entry.clone()).await)?;
    output(&MemoryEntryOutput::from(&entry), json);
    Ok(())
}

pub async fn handle_retrieve(
    ctx: &AppContext,
    key: String,
    namespace: String,
    json: bool,
) -> CommandResult<()> {
    let entry = domain(ctx.memory.retrieve(&key, &namespace).await)?;
    output(&MemoryEntryOutput::from(&entry), json);
    Ok(())
}

pub async fn handle_list(
    ctx: &AppContext,
    namespace: Option<String>,
    pattern: Option<String>,
    tags: Vec<String>,
    limit: usize,
    json: bool,
) -> CommandResult<()> {
    let query = MemoryQuery {
        namespace,
        pattern,
        tags,
        all_tags: false,
        limit: Some(limit),
    };
    let entries = domain(ctx.memory.list(query).await)?;
    let outputs: Vec<MemoryEntryOutput> = entries.iter().map(Into::into).collect();
    output(
        &MemoryListOutput {
            total: outputs.len(),
            entries: outputs,
        },
        json,
    );
    Ok(())
}

pub async fn handle_delete(
    ctx: &AppContext,
    key: String,
    namespace: String,
    json: bool,
) -> CommandResult<()> {
    domain(ctx.memory.delete(&key, &namespace).await)?;
    output(
        &CountOutput {
            count: 1,
            action: "Deleted".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_clear(
    ctx: &AppContext,
    namespace: String,
    force: bool,
    json: bool,
) -> CommandResult<()> {
    if !force {
        return Err(DomainError::InvalidArgument(format!(
            "refusing to clear namespace '{namespace}' without --force"
        ))
        .into());
    }

    let count = domain(ctx.memory.clear_namespace(&namespace).await)?;
    output(
        &CountOutput {
            count,
            action: "Cleared".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_export(
    ctx: &AppContext,
    path: &Path,
    namespace: Option<String>,
    json: bool,
) -> CommandResult<()> {
    let query = MemoryQuery {
        namespace,
        ..MemoryQuery::default()
    };
    let entries = domain(ctx.memory.list(query).await)?;
    let bytes = serde_json::to_vec_pretty(&entries).map_err(DomainError::from)?;
    tokio::fs::write(path, bytes).await.map_err(DomainError::from)?;

    output(
        &CountOutput {
            count: entries.len() as u64,
            action: "Exported".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_import(ctx: &AppContext, path: &Path, json: bool) -> CommandResult<()> {
    let bytes = tokio::fs::read(path).await.map_err(DomainError::from)?;
    let entries: Vec<MemoryEntry> =
        serde_json::from_slice(&bytes).map_err(DomainError::from)?;

    let count = entries.len() as u64;
    domain(ctx.memory.store_many(entries).await)?;

    output(
        &CountOutput {
            count,
            action: "Imported".to_string(),
        },
        json,
    );
    Ok(())
}

pub async fn handle_stats(ctx: &AppContext, json: bool) -> CommandResult<()> {
    let stats = domain(ctx.memory.stats().await)?;
    output(&StatsOutput { stats }, json);
    Ok(())
}
