//! Session repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Checkpoint, LogLevel, Session, SessionLog, SessionStatus};

/// Repository interface for Session persistence, including checkpoints
/// and the append-only session log.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> DomainResult<()>;

    async fn get(&self, id: &str) -> DomainResult<Option<Session>>;

    async fn update(&self, session: &Session) -> DomainResult<()>;

    /// Removes the session row. Checkpoints and logs cascade.
    async fn delete(&self, id: &str) -> DomainResult<()>;

    async fn list_by_status(&self, statuses: &[SessionStatus]) -> DomainResult<Vec<Session>>;

    async fn list_all(&self) -> DomainResult<Vec<Session>>;

    // -- Checkpoints --

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> DomainResult<()>;

    /// Checkpoints for a session, most recent first.
    async fn list_checkpoints(&self, session_id: &str) -> DomainResult<Vec<Checkpoint>>;

    async fn delete_checkpoints(&self, session_id: &str) -> DomainResult<u64>;

    // -- Session log --

    async fn append_log(
        &self,
        session_id: &str,
        level: LogLevel,
        message: &str,
        agent_id: Option<uuid::Uuid>,
        data: Option<serde_json::Value>,
    ) -> DomainResult<()>;

    /// Most recent `limit` log events, newest first.
    async fn recent_logs(&self, session_id: &str, limit: usize) -> DomainResult<Vec<SessionLog>>;

    async fn delete_logs(&self, session_id: &str) -> DomainResult<u64>;
}
