//! SQLite implementation of the SessionRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Checkpoint, LogLevel, Session, SessionLog, SessionStatus};
use crate::domain::ports::SessionRepository;

#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &Session) -> DomainResult<()> {
        let checkpoint_json = session
            .checkpoint_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metadata_json = serde_json::to_string(&session.metadata)?;
        let child_pids_json = serde_json::to_string(&session.child_pids)?;

        sqlx::query(
            r#"INSERT INTO sessions (id, swarm_id, swarm_name, objective, status, parent_pid,
               child_pids, checkpoint_data, completion_percentage, metadata,
               created_at, updated_at, paused_at, resumed_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&session.id)
        .bind(session.swarm_id.to_string())
        .bind(&session.swarm_name)
        .bind(&session.objective)
        .bind(session.status.as_str())
        .bind(session.parent_pid)
        .bind(&child_pids_json)
        .bind(checkpoint_json)
        .bind(i64::from(session.completion_percentage))
        .bind(&metadata_json)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .bind(session.paused_at.map(|t| t.to_rfc3339()))
        .bind(session.resumed_at.map(|t| t.to_rfc3339()))
        .bind(session.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, session: &Session) -> DomainResult<()> {
        let checkpoint_json = session
            .checkpoint_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metadata_json = serde_json::to_string(&session.metadata)?;
        let child_pids_json = serde_json::to_string(&session.child_pids)?;

        let result = sqlx::query(
            r#"UPDATE sessions SET swarm_name = ?, objective = ?, status = ?, parent_pid = ?,
               child_pids = ?, checkpoint_data = ?, completion_percentage = ?, metadata = ?,
               updated_at = ?, paused_at = ?, resumed_at = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(&session.swarm_name)
        .bind(&session.objective)
        .bind(session.status.as_str())
        .bind(session.parent_pid)
        .bind(&child_pids_json)
        .bind(checkpoint_json)
        .bind(i64::from(session.completion_percentage))
        .bind(&metadata_json)
        .bind(session.updated_at.to_rfc3339())
        .bind(session.paused_at.map(|t| t.to_rfc3339()))
        .bind(session.resumed_at.map(|t| t.to_rfc3339()))
        .bind(session.completed_at.map(|t| t.to_rfc3339()))
        .bind(&session.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(session.id.clone()));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list_by_status(&self, statuses: &[SessionStatus]) -> DomainResult<Vec<Session>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let query = format!(
            "SELECT * FROM sessions WHERE status IN ({placeholders}) ORDER BY created_at"
        );

        let mut q = sqlx::query_as::<_, SessionRow>(&query);
        for status in statuses {
            q = q.bind(status.as_str());
        }

        let rows: Vec<SessionRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_all(&self) -> DomainResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as("SELECT * FROM sessions ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> DomainResult<()> {
        let data_json = serde_json::to_string(&checkpoint.data)?;

        sqlx::query(
            r#"INSERT INTO session_checkpoints (id, session_id, name, data, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(checkpoint.id.to_string())
        .bind(&checkpoint.session_id)
        .bind(&checkpoint.name)
        .bind(&data_json)
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_checkpoints(&self, session_id: &str) -> DomainResult<Vec<Checkpoint>> {
        let rows: Vec<CheckpointRow> = sqlx::query_as(
            "SELECT * FROM session_checkpoints WHERE session_id = ? ORDER BY created_at DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_checkpoints(&self, session_id: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM session_checkpoints WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_log(
        &self,
        session_id: &str,
        level: LogLevel,
        message: &str,
        agent_id: Option<uuid::Uuid>,
        data: Option<serde_json::Value>,
    ) -> DomainResult<()> {
        let data_json = data.map(|d| serde_json::to_string(&d)).transpose()?;

        sqlx::query(
            r#"INSERT INTO session_logs (session_id, timestamp, log_level, message, agent_id, data)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(level.as_str())
        .bind(message)
        .bind(agent_id.map(|id| id.to_string()))
        .bind(data_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_logs(&self, session_id: &str, limit: usize) -> DomainResult<Vec<SessionLog>> {
        let rows: Vec<SessionLogRow> = sqlx::query_as(
            "SELECT * FROM session_logs WHERE session_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_logs(&self, session_id: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM session_logs WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    swarm_id: String,
    swarm_name: String,
    objective: Option<String>,
    status: String,
    parent_pid: i64,
    child_pids: String,
    checkpoint_data: Option<String>,
    completion_percentage: i64,
    metadata: String,
    created_at: String,
    updated_at: String,
    paused_at: Option<String>,
    resumed_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<SessionRow> for Session {
    type Error = DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid status: {}", row.status)))?;

        let checkpoint_data: Option<serde_json::Value> = row
            .checkpoint_data
            .map(|c| serde_json::from_str(&c))
            .transpose()
            .map_err(|e| DomainError::CorruptedCheckpoint {
                session_id: row.id.clone(),
                reason: e.to_string(),
            })?;

        let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&row.metadata)?;
        let child_pids: Vec<i32> = serde_json::from_str(&row.child_pids)?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Session {
            id: row.id,
            swarm_id: super::parse_uuid(&row.swarm_id)?,
            swarm_name: row.swarm_name,
            objective: row.objective,
            status,
            parent_pid: row.parent_pid as i32,
            child_pids,
            checkpoint_data,
            completion_percentage: row.completion_percentage.clamp(0, 100) as u8,
            metadata,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            paused_at: super::parse_optional_datetime(row.paused_at)?,
            resumed_at: super::parse_optional_datetime(row.resumed_at)?,
            completed_at: super::parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CheckpointRow {
    id: String,
    session_id: String,
    name: String,
    data: String,
    created_at: String,
}

impl TryFrom<CheckpointRow> for Checkpoint {
    type Error = DomainError;

    fn try_from(row: CheckpointRow) -> Result<Self, Self::Error> {
        Ok(Checkpoint {
            id: super::parse_uuid(&row.id)?,
            session_id: row.session_id,
            name: row.name,
            data: serde_json::from_str(&row.data)?,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionLogRow {
    id: i64,
    session_id: String,
    timestamp: String,
    log_level: String,
    message: String,
    agent_id: Option<String>,
    data: Option<String>,
}

impl TryFrom<SessionLogRow> for SessionLog {
    type Error = DomainError;

    fn try_from(row: SessionLogRow) -> Result<Self, Self::Error> {
        let log_level = LogLevel::from_str(&row.log_level).unwrap_or_default();
        let data = row.data.map(|d| serde_json::from_str(&d)).transpose()?;

        Ok(SessionLog {
            id: row.id,
            session_id: row.session_id,
            timestamp: super::parse_datetime(&row.timestamp)?,
            log_level,
            message: row.message,
            agent_id: super::parse_optional_uuid(row.agent_id)?,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteSwarmRepository};
    use crate::domain::models::Swarm;
    use crate::domain::ports::SwarmRepository;
    use serde_json::json;

    async fn setup() -> (SqliteSessionRepository, Session) {
        let pool = create_migrated_test_pool().await.unwrap();
        let swarm = Swarm::new("Test");
        SqliteSwarmRepository::new(pool.clone())
            .create(&swarm)
            .await
            .unwrap();
        let session = Session::new(swarm.id, "Test", None);
        (SqliteSessionRepository::new(pool), session)
    }

    #[tokio::test]
    async fn test_session_roundtrip() {
        let (repo, mut session) = setup().await;
        session.add_child_pid(4242);
        repo.create(&session).await.unwrap();

        let loaded = repo.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Active);
        assert_eq!(loaded.child_pids, vec![4242]);
        assert_eq!(loaded.parent_pid, session.parent_pid);
    }

    #[tokio::test]
    async fn test_checkpoints_most_recent_first() {
        let (repo, session) = setup().await;
        repo.create(&session).await.unwrap();

        for i in 0..3 {
            let mut cp = Checkpoint::new(&session.id, format!("cp-{i}"), json!({ "n": i }));
            cp.created_at = chrono::Utc::now() + chrono::Duration::milliseconds(i);
            repo.create_checkpoint(&cp).await.unwrap();
        }

        let checkpoints = repo.list_checkpoints(&session.id).await.unwrap();
        assert_eq!(checkpoints.len(), 3);
        assert_eq!(checkpoints[0].name, "cp-2");
    }

    #[tokio::test]
    async fn test_logs_ordered_by_insertion() {
        let (repo, session) = setup().await;
        repo.create(&session).await.unwrap();

        for i in 0..5 {
            repo.append_log(&session.id, LogLevel::Info, &format!("event {i}"), None, None)
                .await
                .unwrap();
        }

        let logs = repo.recent_logs(&session.id, 3).await.unwrap();
        assert_eq!(logs.len(), 3);
        // Newest first, ordered by the db-assigned id.
        assert_eq!(logs[0].message, "event 4");
        assert_eq!(logs[2].message, "event 2");
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (repo, session) = setup().await;
        repo.create(&session).await.unwrap();
        repo.append_log(&session.id, LogLevel::Info, "x", None, None)
            .await
            .unwrap();
        repo.create_checkpoint(&Checkpoint::new(&session.id, "cp", json!({})))
            .await
            .unwrap();

        repo.delete_logs(&session.id).await.unwrap();
        repo.delete_checkpoints(&session.id).await.unwrap();
        repo.delete(&session.id).await.unwrap();

        assert!(repo.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let (repo, mut session) = setup().await;
        repo.create(&session).await.unwrap();

        session.pause();
        repo.update(&session).await.unwrap();

        let active_or_paused = repo
            .list_by_status(&[SessionStatus::Active, SessionStatus::Paused])
            .await
            .unwrap();
        assert_eq!(active_or_paused.len(), 1);

        let stopped = repo.list_by_status(&[SessionStatus::Stopped]).await.unwrap();
        assert!(stopped.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_data_surfaces_typed_error() {
        let (repo, session) = setup().await;
        repo.create(&session).await.unwrap();

        // Corrupt the checkpoint blob behind the repository's back.
        sqlx::query("UPDATE sessions SET checkpoint_data = 'not json' WHERE id = ?")
            .bind(&session.id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let err = repo.get(&session.id).await.unwrap_err();
        assert!(matches!(err, DomainError::CorruptedCheckpoint { .. }));
    }
}
