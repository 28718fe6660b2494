//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentResources, AgentRole, AgentStatus};
use crate::domain::ports::AgentRepository;

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let capabilities_json = serde_json::to_string(&agent.capabilities)?;

        sqlx::query(
            r#"INSERT INTO agents (id, swarm_id, name, agent_type, role, capabilities, status,
               current_task_id, cpu_budget, memory_budget_mb, max_concurrent_tasks,
               created_at, last_heartbeat)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(agent.swarm_id.to_string())
        .bind(&agent.name)
        .bind(&agent.agent_type)
        .bind(agent.role.as_str())
        .bind(&capabilities_json)
        .bind(agent.status.as_str())
        .bind(agent.current_task_id.map(|id| id.to_string()))
        .bind(agent.resources.cpu_budget)
        .bind(i64::from(agent.resources.memory_budget_mb))
        .bind(i64::from(agent.resources.max_concurrent_tasks))
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.last_heartbeat.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let capabilities_json = serde_json::to_string(&agent.capabilities)?;

        let result = sqlx::query(
            r#"UPDATE agents SET name = ?, agent_type = ?, role = ?, capabilities = ?,
               status = ?, current_task_id = ?, cpu_budget = ?, memory_budget_mb = ?,
               max_concurrent_tasks = ?, last_heartbeat = ?
               WHERE id = ?"#,
        )
        .bind(&agent.name)
        .bind(&agent.agent_type)
        .bind(agent.role.as_str())
        .bind(&capabilities_json)
        .bind(agent.status.as_str())
        .bind(agent.current_task_id.map(|id| id.to_string()))
        .bind(agent.resources.cpu_budget)
        .bind(i64::from(agent.resources.memory_budget_mb))
        .bind(i64::from(agent.resources.max_concurrent_tasks))
        .bind(agent.last_heartbeat.map(|t| t.to_rfc3339()))
        .bind(agent.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(agent.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(id));
        }

        Ok(())
    }

    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as("SELECT * FROM agents WHERE swarm_id = ? ORDER BY created_at, id")
                .bind(swarm_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_status(
        &self,
        swarm_id: Uuid,
        status: AgentStatus,
    ) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(
            "SELECT * FROM agents WHERE swarm_id = ? AND status = ? ORDER BY created_at, id",
        )
        .bind(swarm_id.to_string())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AgentStatus,
        current_task_id: Option<Uuid>,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE agents SET status = ?, current_task_id = ?, last_heartbeat = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(current_task_id.map(|t| t.to_string()))
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AgentNotFound(id));
        }

        Ok(())
    }

    async fn terminate_all(&self, swarm_id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query(
            "UPDATE agents SET status = 'terminated', current_task_id = NULL WHERE swarm_id = ?",
        )
        .bind(swarm_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    swarm_id: String,
    name: String,
    agent_type: String,
    role: String,
    capabilities: String,
    status: String,
    current_task_id: Option<String>,
    cpu_budget: f64,
    memory_budget_mb: i64,
    max_concurrent_tasks: i64,
    created_at: String,
    last_heartbeat: Option<String>,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let role = AgentRole::from_str(&row.role)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid role: {}", row.role)))?;
        let status = AgentStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid status: {}", row.status)))?;
        let capabilities: Vec<String> = serde_json::from_str(&row.capabilities)?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Agent {
            id: super::parse_uuid(&row.id)?,
            swarm_id: super::parse_uuid(&row.swarm_id)?,
            name: row.name,
            agent_type: row.agent_type,
            role,
            capabilities,
            status,
            current_task_id: super::parse_optional_uuid(row.current_task_id)?,
            resources: AgentResources {
                cpu_budget: row.cpu_budget,
                memory_budget_mb: row.memory_budget_mb as u32,
                max_concurrent_tasks: row.max_concurrent_tasks as u32,
            },
            created_at: super::parse_datetime(&row.created_at)?,
            last_heartbeat: super::parse_optional_datetime(row.last_heartbeat)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteSwarmRepository};
    use crate::domain::models::Swarm;
    use crate::domain::ports::SwarmRepository;

    async fn setup() -> (SqliteAgentRepository, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let swarm = Swarm::new("Test");
        SqliteSwarmRepository::new(pool.clone())
            .create(&swarm)
            .await
            .unwrap();
        (SqliteAgentRepository::new(pool), swarm.id)
    }

    #[tokio::test]
    async fn test_create_and_get_agent() {
        let (repo, swarm_id) = setup().await;
        let agent = Agent::new(swarm_id, "worker-1", "coder")
            .with_capabilities(vec!["code_generation".into()]);

        repo.create(&agent).await.unwrap();

        let loaded = repo.get(agent.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "worker-1");
        assert!(loaded.has_capability("code_generation"));
        assert_eq!(loaded.status, AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_list_by_status_preserves_insertion_order() {
        let (repo, swarm_id) = setup().await;
        for i in 0..3 {
            let mut agent = Agent::new(swarm_id, format!("worker-{i}"), "coder");
            agent.created_at = chrono::Utc::now() + chrono::Duration::milliseconds(i);
            repo.create(&agent).await.unwrap();
        }

        let idle = repo.list_by_status(swarm_id, AgentStatus::Idle).await.unwrap();
        assert_eq!(idle.len(), 3);
        assert_eq!(idle[0].name, "worker-0");
        assert_eq!(idle[2].name, "worker-2");
    }

    #[tokio::test]
    async fn test_update_status_with_task() {
        let (repo, swarm_id) = setup().await;
        let agent = Agent::new(swarm_id, "worker-1", "coder");
        repo.create(&agent).await.unwrap();

        let task_id = Uuid::new_v4();
        repo.update_status(agent.id, AgentStatus::Busy, Some(task_id))
            .await
            .unwrap();

        let loaded = repo.get(agent.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, AgentStatus::Busy);
        assert_eq!(loaded.current_task_id, Some(task_id));
        assert!(loaded.last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_terminate_all() {
        let (repo, swarm_id) = setup().await;
        repo.create(&Agent::new(swarm_id, "a", "coder")).await.unwrap();
        repo.create(&Agent::new(swarm_id, "b", "tester")).await.unwrap();

        let count = repo.terminate_all(swarm_id).await.unwrap();
        assert_eq!(count, 2);

        let idle = repo.list_by_status(swarm_id, AgentStatus::Idle).await.unwrap();
        assert!(idle.is_empty());
    }
}
