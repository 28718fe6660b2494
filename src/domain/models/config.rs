//! Process configuration.
//!
//! All tunables are named, enumerated structs. A single `HiveConfig` is
//! built by the loader and passed by reference; tests replace it
//! wholesale.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which memory backend to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    Sqlite,
    Markdown,
    Hybrid,
}

impl Default for MemoryBackendKind {
    fn default() -> Self {
        Self::Sqlite
    }
}

impl MemoryBackendKind {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "markdown" => Some(Self::Markdown),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Which terminal driver to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalType {
    Auto,
    Vscode,
    Native,
}

impl Default for TerminalType {
    fn default() -> Self {
        Self::Auto
    }
}

impl TerminalType {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "vscode" => Some(Self::Vscode),
            "native" => Some(Self::Native),
            _ => None,
        }
    }
}

/// MCP transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    Stdio,
    Http,
    Websocket,
}

impl Default for McpTransport {
    fn default() -> Self {
        Self::Stdio
    }
}

impl McpTransport {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "websocket" => Some(Self::Websocket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently live drivers.
    pub max_concurrent_agents: usize,
    /// Default per-task timeout applied when a task carries none.
    pub task_timeout_secs: u64,
    pub max_retries: u32,
    /// Bound on the coordinator work queue.
    pub max_tasks: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 8,
            task_timeout_secs: 600,
            max_retries: 3,
            max_tasks: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".hive-mind/hive.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub backend: MemoryBackendKind,
    pub cache_size_mb: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackendKind::Sqlite,
            cache_size_mb: 64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub terminal_type: TerminalType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub transport: McpTransport,
    pub port: u16,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: McpTransport::Stdio,
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
    /// One of json, pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the persisted layout: database, sessions/, archive/.
    pub root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".hive-mind"),
        }
    }
}

impl PathsConfig {
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("sessions").join("archive")
    }
}

/// Top-level process configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    pub orchestrator: OrchestratorConfig,
    pub database: DatabaseConfig,
    pub memory: MemoryConfig,
    pub terminal: TerminalConfig,
    pub mcp: McpConfig,
    pub logging: LoggingConfig,
    pub autosave: AutosaveConfig,
    pub paths: PathsConfig,
    /// Set by HIVE_TEST_MODE=true: disables auto-save, forces the
    /// in-memory store.
    pub test_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = HiveConfig::default();
        assert_eq!(cfg.orchestrator.max_concurrent_agents, 8);
        assert_eq!(cfg.orchestrator.task_timeout_secs, 600);
        assert_eq!(cfg.autosave.interval_secs, 30);
        assert_eq!(cfg.database.path, ".hive-mind/hive.db");
        assert!(!cfg.test_mode);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(MemoryBackendKind::from_str("hybrid"), Some(MemoryBackendKind::Hybrid));
        assert_eq!(MemoryBackendKind::from_str("redis"), None);
        assert_eq!(TerminalType::from_str("vscode"), Some(TerminalType::Vscode));
        assert_eq!(McpTransport::from_str("websocket"), Some(McpTransport::Websocket));
    }

    #[test]
    fn test_paths() {
        let paths = PathsConfig::default();
        assert_eq!(paths.sessions_dir(), PathBuf::from(".hive-mind/sessions"));
        assert_eq!(paths.archive_dir(), PathBuf::from(".hive-mind/sessions/archive"));
    }
}
