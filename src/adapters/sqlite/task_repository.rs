//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskConstraints, TaskResult, TaskStatus};
use crate::domain::ports::{TaskFilter, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_dependencies(&self, task: &mut Task) -> DomainResult<()> {
        let deps: Vec<(String,)> =
            sqlx::query_as("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
                .bind(task.id.to_string())
                .fetch_all(&self.pool)
                .await?;

        task.depends_on = deps
            .into_iter()
            .filter_map(|(id,)| Uuid::parse_str(&id).ok())
            .collect();

        Ok(())
    }

    async fn rows_to_tasks(&self, rows: Vec<TaskRow>) -> DomainResult<Vec<Task>> {
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let mut task: Task = row.try_into()?;
            self.load_dependencies(&mut task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO tasks (id, swarm_id, objective_id, task_type, name, description,
               instructions, status, priority, progress, assigned_agent_id, timeout_secs,
               max_retries, attempt_count, result, error, created_at, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.swarm_id.to_string())
        .bind(task.objective_id.map(|id| id.to_string()))
        .bind(&task.task_type)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.instructions)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(i64::from(task.progress))
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(i64::try_from(task.constraints.timeout_secs).unwrap_or(i64::MAX))
        .bind(i64::from(task.constraints.max_retries))
        .bind(i64::from(task.attempt_count))
        .bind(result_json)
        .bind(&task.error)
        .bind(task.created_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        for dep_id in &task.depends_on {
            self.add_dependency(task.id, *dep_id).await?;
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let mut task: Task = r.try_into()?;
                self.load_dependencies(&mut task).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"UPDATE tasks SET objective_id = ?, task_type = ?, name = ?, description = ?,
               instructions = ?, status = ?, priority = ?, progress = ?, assigned_agent_id = ?,
               timeout_secs = ?, max_retries = ?, attempt_count = ?, result = ?, error = ?,
               started_at = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(task.objective_id.map(|id| id.to_string()))
        .bind(&task.task_type)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.instructions)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(i64::from(task.progress))
        .bind(task.assigned_agent_id.map(|id| id.to_string()))
        .bind(i64::try_from(task.constraints.timeout_secs).unwrap_or(i64::MAX))
        .bind(i64::from(task.constraints.max_retries))
        .bind(i64::from(task.attempt_count))
        .bind(result_json)
        .bind(&task.error)
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(id));
        }

        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(swarm_id) = &filter.swarm_id {
            query.push_str(" AND swarm_id = ?");
            bindings.push(swarm_id.to_string());
        }
        if let Some(objective_id) = &filter.objective_id {
            query.push_str(" AND objective_id = ?");
            bindings.push(objective_id.to_string());
        }
        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(task_type) = &filter.task_type {
            query.push_str(" AND task_type = ?");
            bindings.push(task_type.clone());
        }
        if let Some(agent_id) = &filter.assigned_agent_id {
            query.push_str(" AND assigned_agent_id = ?");
            bindings.push(agent_id.to_string());
        }

        query.push_str(" ORDER BY priority DESC, created_at");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        self.rows_to_tasks(rows).await
    }

    async fn list_by_objective(&self, objective_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE objective_id = ? ORDER BY created_at")
                .bind(objective_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        self.rows_to_tasks(rows).await
    }

    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE swarm_id = ? ORDER BY created_at")
                .bind(swarm_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        self.rows_to_tasks(rows).await
    }

    async fn search(&self, swarm_id: Option<Uuid>, query: &str) -> DomainResult<Vec<Task>> {
        let pattern = format!("%{}%", query.replace('%', ""));
        let rows: Vec<TaskRow> = if let Some(swarm_id) = swarm_id {
            sqlx::query_as(
                r#"SELECT * FROM tasks WHERE swarm_id = ?
                   AND (name LIKE ? OR description LIKE ?) ORDER BY created_at"#,
            )
            .bind(swarm_id.to_string())
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "SELECT * FROM tasks WHERE name LIKE ? OR description LIKE ? ORDER BY created_at",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await?
        };

        self.rows_to_tasks(rows).await
    }

    async fn add_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
            .bind(task_id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_dependency(&self, task_id: Uuid, depends_on: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_id = ?")
            .bind(task_id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_dependencies(&self, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT t.* FROM tasks t
               INNER JOIN task_dependencies d ON t.id = d.depends_on_id
               WHERE d.task_id = ?"#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn claim_task(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Option<Task>> {
        let result = sqlx::query(
            r#"UPDATE tasks SET status = 'assigned', assigned_agent_id = ?
               WHERE id = ? AND status = 'pending'"#,
        )
        .bind(agent_id.to_string())
        .bind(task_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(task_id).await
    }

    async fn complete_and_release(
        &self,
        task_id: Uuid,
        agent_id: Uuid,
        result: &TaskResult,
    ) -> DomainResult<()> {
        let result_json = serde_json::to_string(result)?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE tasks SET status = 'completed', progress = 100, result = ?,
               error = NULL, completed_at = ? WHERE id = ?"#,
        )
        .bind(&result_json)
        .bind(&now)
        .bind(task_id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task_id));
        }

        sqlx::query(
            r#"UPDATE agents SET status = 'idle', current_task_id = NULL, last_heartbeat = ?
               WHERE id = ?"#,
        )
        .bind(&now)
        .bind(agent_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn count_by_status(&self, swarm_id: Uuid) -> DomainResult<HashMap<TaskStatus, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks WHERE swarm_id = ? GROUP BY status")
                .bind(swarm_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (status_str, count) in rows {
            if let Some(status) = TaskStatus::from_str(&status_str) {
                #[allow(clippy::cast_sign_loss)]
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    swarm_id: String,
    objective_id: Option<String>,
    task_type: String,
    name: String,
    description: Option<String>,
    instructions: Option<String>,
    status: String,
    priority: i32,
    progress: i64,
    assigned_agent_id: Option<String>,
    timeout_secs: i64,
    max_retries: i64,
    attempt_count: i64,
    result: Option<String>,
    error: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid status: {}", row.status)))?;

        let result: Option<TaskResult> = row
            .result
            .map(|r| serde_json::from_str(&r))
            .transpose()
            .map_err(|e| DomainError::Serialization(e.to_string()))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Task {
            id: super::parse_uuid(&row.id)?,
            swarm_id: super::parse_uuid(&row.swarm_id)?,
            objective_id: super::parse_optional_uuid(row.objective_id)?,
            task_type: row.task_type,
            name: row.name,
            description: row.description.unwrap_or_default(),
            instructions: row.instructions.unwrap_or_default(),
            status,
            priority: row.priority,
            progress: row.progress.clamp(0, 100) as u8,
            assigned_agent_id: super::parse_optional_uuid(row.assigned_agent_id)?,
            depends_on: Vec::new(), // Loaded separately
            constraints: TaskConstraints {
                timeout_secs: row.timeout_secs.max(0) as u64,
                max_retries: row.max_retries.max(0) as u32,
            },
            result,
            error: row.error,
            attempt_count: row.attempt_count.max(0) as u32,
            created_at: super::parse_datetime(&row.created_at)?,
            started_at: super::parse_optional_datetime(row.started_at)?,
            completed_at: super::parse_optional_datetime(row.completed_at)?,
        })
    }
}
