//! Command handlers and the shared application context.

pub mod init;
pub mod memory;
pub mod session;
pub mod spawn;
pub mod task;

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::memory::CompositeMemoryStore;
use crate::adapters::sqlite::{
    initialize_database, SqliteAgentRepository, SqliteObjectiveRepository,
    SqliteSessionRepository, SqliteSwarmRepository, SqliteTaskRepository,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HiveConfig, Session};
use crate::domain::ports::{
    AgentRepository, MemoryStore, ObjectiveRepository, SessionRepository, SwarmRepository,
    TaskRepository,
};
use crate::services::{EventBus, SessionManager, TaskExecutor};

/// An error carrying the process exit code policy: 1 user error,
/// 2 internal/storage error, 3 resumption refused (archived session).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Session {0} has been archived and cannot be resumed")]
    ArchivedSession(String),
}

impl CommandError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ArchivedSession(_) => 3,
            Self::Domain(e) => match e {
                DomainError::InvalidArgument(_)
                | DomainError::SwarmNotFound(_)
                | DomainError::AgentNotFound(_)
                | DomainError::TaskNotFound(_)
                | DomainError::ObjectiveNotFound(_)
                | DomainError::SessionNotFound(_)
                | DomainError::MemoryNotFound { .. }
                | DomainError::AlreadyExists { .. }
                | DomainError::CyclicDependency(_)
                | DomainError::InvalidStateTransition { .. } => 1,
                _ => 2,
            },
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Shared wiring for every command: repositories over one pool, the
/// session manager, and the memory store.
pub struct AppContext {
    pub config: HiveConfig,
    pub pool: SqlitePool,
    pub swarms: Arc<dyn SwarmRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub objectives: Arc<dyn ObjectiveRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub session_manager: Arc<SessionManager>,
    pub memory: Arc<dyn MemoryStore>,
    pub events: Arc<EventBus>,
    pub executor: Arc<TaskExecutor>,
}

impl AppContext {
    pub async fn initialize(config: HiveConfig) -> CommandResult<Self> {
        let database_url = format!("sqlite:{}", config.database.path);
        let pool = initialize_database(&database_url)
            .await
            .map_err(DomainError::from)?;

        let swarms: Arc<dyn SwarmRepository> = Arc::new(SqliteSwarmRepository::new(pool.clone()));
        let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let objectives: Arc<dyn ObjectiveRepository> =
            Arc::new(SqliteObjectiveRepository::new(pool.clone()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(SqliteSessionRepository::new(pool.clone()));

        let session_manager = Arc::new(SessionManager::new(
            sessions.clone(),
            swarms.clone(),
            agents.clone(),
            tasks.clone(),
            config.paths.sessions_dir(),
        ));

        let memory: Arc<dyn MemoryStore> = if config.test_mode {
            Arc::new(CompositeMemoryStore::in_memory())
        } else {
            Arc::new(CompositeMemoryStore::from_pool(pool.clone()))
        };

        let events = Arc::new(EventBus::default());
        let executor = Arc::new(TaskExecutor::new(
            tasks.clone(),
            agents.clone(),
            events.clone(),
        ));

        Ok(Self {
            config,
            pool,
            swarms,
            agents,
            objectives,
            tasks,
            sessions,
            session_manager,
            memory,
            events,
            executor,
        })
    }

    /// Resolve a session id from a full id or a unique prefix.
    pub async fn resolve_session_id(&self, input: &str) -> CommandResult<String> {
        let sessions = self.sessions.list_all().await.map_err(CommandError::from)?;
        let matches: Vec<&Session> = sessions
            .iter()
            .filter(|s| s.id == input || s.id.starts_with(input))
            .collect();

        match matches.len() {
            1 => Ok(matches[0].id.clone()),
            0 => {
                // Refuse resumption of archived sessions distinctly.
                if self.archive_file_for(input).is_some() {
                    Err(CommandError::ArchivedSession(input.to_string()))
                } else {
                    Err(DomainError::SessionNotFound(input.to_string()).into())
                }
            }
            _ => Err(DomainError::InvalidArgument(format!(
                "ambiguous session id prefix: {input}"
            ))
            .into()),
        }
    }

    fn archive_file_for(&self, session_id: &str) -> Option<PathBuf> {
        let dir = self.config.paths.archive_dir();
        let entries = std::fs::read_dir(&dir).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(session_id) && name.ends_with("-archive.json") {
                return Some(entry.path());
            }
        }
        None
    }

    /// Resolve a task id from a full id or a unique prefix, scoped to
    /// the current swarm.
    pub async fn resolve_task_id(&self, input: &str) -> CommandResult<Uuid> {
        if let Ok(id) = Uuid::parse_str(input) {
            return Ok(id);
        }

        let swarm_id = self.current_swarm_id().await?;
        let tasks = self
            .tasks
            .list_by_swarm(swarm_id)
            .await
            .map_err(CommandError::from)?;
        let matches: Vec<Uuid> = tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(input))
            .map(|t| t.id)
            .collect();

        match matches.len() {
            1 => Ok(matches[0]),
            0 => Err(DomainError::InvalidArgument(format!("unknown task id: {input}")).into()),
            _ => Err(DomainError::InvalidArgument(format!(
                "ambiguous task id prefix: {input}"
            ))
            .into()),
        }
    }

    /// The swarm owning the most recently created session.
    pub async fn current_swarm_id(&self) -> CommandResult<Uuid> {
        let sessions = self.sessions.list_all().await.map_err(CommandError::from)?;
        sessions
            .iter()
            .max_by_key(|s| s.created_at)
            .map(|s| s.swarm_id)
            .ok_or_else(|| {
                DomainError::InvalidArgument(
                    "no swarm initialized; run `hivemind init` first".to_string(),
                )
                .into()
            })
    }

}

/// Shortcut used by handlers that surface `DomainResult` values.
pub fn domain<T>(result: DomainResult<T>) -> CommandResult<T> {
    result.map_err(CommandError::from)
}
