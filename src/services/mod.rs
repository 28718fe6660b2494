//! Service layer: coordination, execution, sessions, auto-save, config.

pub mod autosave;
pub mod config;
pub mod coordinator;
pub mod decomposition;
pub mod events;
pub mod executor;
pub mod session_manager;

pub use autosave::AutoSaveMiddleware;
pub use config::{init_tracing, ConfigError, ConfigLoader};
pub use coordinator::{CoordinatorConfig, CoordinatorMetrics, SwarmCoordinator, SwarmStatusReport};
pub use events::{EventBus, EventEnvelope, SwarmEvent};
pub use executor::{AgentLease, ExecutionMetrics, ExecutionResult, TaskExecutor};
pub use session_manager::{FullSession, SessionManager, SessionSummary};
