//! Domain errors for the hivemind coordination core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors surfaced by coordinator, executor, session manager
/// and memory store operations.
#[derive(Debug, Error)]
pub enum DomainError {
    // -- User errors --
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Swarm not found: {0}")]
    SwarmNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Objective not found: {0}")]
    ObjectiveNotFound(Uuid),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Memory key not found: {key} (namespace: {namespace})")]
    MemoryNotFound { namespace: String, key: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Task dependency cycle detected involving task: {0}")]
    CyclicDependency(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // -- Transient system errors (retried per policy) --
    #[error("Storage responded too slowly: {0}")]
    StorageSlow(String),

    #[error("Failed to signal pid {pid}: {reason}")]
    PidSignalFailed { pid: i32, reason: String },

    // -- Hard system errors --
    #[error("Storage backend unavailable: {0}")]
    StorageUnavailable(String),

    #[error("No memory backend could be initialized: {0}")]
    BackendUnavailable(String),

    #[error("Corrupted checkpoint for session {session_id}: {reason}")]
    CorruptedCheckpoint { session_id: String, reason: String },

    #[error("Failed to resume session {session_id}: {source}")]
    ResumeFailed {
        session_id: String,
        #[source]
        source: Box<DomainError>,
    },

    // -- Driver errors --
    #[error("Driver timed out after {0} seconds")]
    DriverTimeout(u64),

    #[error("Driver exited with non-zero status {code}")]
    DriverExitedNonZero { code: i32 },

    #[error("Driver panicked: {0}")]
    DriverPanic(String),

    #[error("Invalid instructions: {0}")]
    InvalidInstructions(String),

    // -- Infrastructure passthrough --
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the executor may retry a task that failed with this error.
    /// `InvalidInstructions` is terminal; other driver errors consume the
    /// retry budget instead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidInstructions(_))
    }

    /// Whether this error class is transient (retried once before
    /// propagation, independent of the task retry budget).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageSlow(_) | Self::PidSignalFailed { .. })
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            // Connection acquisition past its window: transient, the
            // caller's retry policy applies.
            sqlx::Error::PoolTimedOut => {
                DomainError::StorageSlow("connection acquisition timed out".to_string())
            }
            other => DomainError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
