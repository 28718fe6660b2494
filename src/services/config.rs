//! Configuration loader with hierarchical merging.
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults (Serialized)
//! 2. .hive-mind/config.yaml (project config, created by init)
//! 3. .hive-mind/local.yaml (project local overrides, optional)
//! 4. HIVEMIND_* environment variables
//! 5. The legacy CLAUDE_FLOW_* / HIVE_TEST_MODE variables, applied as
//!    explicit named overrides

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{
    HiveConfig, McpTransport, MemoryBackendKind, TerminalType,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_agents: {0}. Must be between 1 and 100")]
    InvalidMaxAgents(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid MCP port: {0}. Must be between 1 and 65535")]
    InvalidMcpPort(String),

    #[error("Invalid value for {variable}: {value}")]
    InvalidEnvValue { variable: &'static str, value: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<HiveConfig> {
        let mut config: HiveConfig = Figment::new()
            .merge(Serialized::defaults(HiveConfig::default()))
            .merge(Yaml::file(".hive-mind/config.yaml"))
            .merge(Yaml::file(".hive-mind/local.yaml"))
            .merge(Env::prefixed("HIVEMIND_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<HiveConfig> {
        let mut config: HiveConfig = Figment::new()
            .merge(Serialized::defaults(HiveConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::apply_env_overrides(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// The recognized environment variables, each an explicit named
    /// override with an enumerated value set.
    pub fn apply_env_overrides(config: &mut HiveConfig) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("CLAUDE_FLOW_MAX_AGENTS") {
            let n: usize = v.parse().map_err(|_| ConfigError::InvalidEnvValue {
                variable: "CLAUDE_FLOW_MAX_AGENTS",
                value: v.clone(),
            })?;
            config.orchestrator.max_concurrent_agents = n;
        }

        if let Ok(v) = std::env::var("CLAUDE_FLOW_TERMINAL_TYPE") {
            config.terminal.terminal_type =
                TerminalType::from_str(&v).ok_or(ConfigError::InvalidEnvValue {
                    variable: "CLAUDE_FLOW_TERMINAL_TYPE",
                    value: v,
                })?;
        }

        if let Ok(v) = std::env::var("CLAUDE_FLOW_MEMORY_BACKEND") {
            config.memory.backend =
                MemoryBackendKind::from_str(&v).ok_or(ConfigError::InvalidEnvValue {
                    variable: "CLAUDE_FLOW_MEMORY_BACKEND",
                    value: v,
                })?;
        }

        if let Ok(v) = std::env::var("CLAUDE_FLOW_MCP_TRANSPORT") {
            config.mcp.transport =
                McpTransport::from_str(&v).ok_or(ConfigError::InvalidEnvValue {
                    variable: "CLAUDE_FLOW_MCP_TRANSPORT",
                    value: v,
                })?;
        }

        if let Ok(v) = std::env::var("CLAUDE_FLOW_MCP_PORT") {
            let port: u16 = v
                .parse()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| ConfigError::InvalidMcpPort(v.clone()))?;
            config.mcp.port = port;
        }

        if let Ok(v) = std::env::var("CLAUDE_FLOW_LOG_LEVEL") {
            let level = v.to_lowercase();
            if !["debug", "info", "warn", "error"].contains(&level.as_str()) {
                return Err(ConfigError::InvalidLogLevel(v));
            }
            config.logging.level = level;
        }

        if let Ok(v) = std::env::var("HIVE_TEST_MODE") {
            if v == "true" {
                config.test_mode = true;
                config.autosave.enabled = false;
            }
        }

        Ok(())
    }

    pub fn validate(config: &HiveConfig) -> Result<(), ConfigError> {
        if config.orchestrator.max_concurrent_agents == 0
            || config.orchestrator.max_concurrent_agents > 100
        {
            return Err(ConfigError::InvalidMaxAgents(
                config.orchestrator.max_concurrent_agents,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

/// Install the tracing subscriber according to the logging config.
pub fn init_tracing(config: &HiveConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
