//! Domain models for the hivemind coordination core.

pub mod agent;
pub mod config;
pub mod memory;
pub mod objective;
pub mod session;
pub mod swarm;
pub mod task;

pub use agent::{Agent, AgentResources, AgentRole, AgentStatus};
pub use config::{
    AutosaveConfig, DatabaseConfig, HiveConfig, LoggingConfig, McpConfig, McpTransport,
    MemoryBackendKind, MemoryConfig, OrchestratorConfig, PathsConfig, TerminalConfig, TerminalType,
};
pub use memory::{glob_match, MemoryEntry, MemoryQuery, MemoryStats, DEFAULT_NAMESPACE};
pub use objective::{resolve_strategy, Objective, ObjectiveStatus, ObjectiveStrategy};
pub use session::{
    Checkpoint, LogLevel, Session, SessionExport, SessionLog, SessionStatistics, SessionStatus,
};
pub use swarm::{QueenType, Swarm, SwarmStatus, SwarmTopology};
pub use task::{Task, TaskConstraints, TaskResult, TaskStatus};
