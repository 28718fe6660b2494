//! SQLite implementation of the ObjectiveRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Objective, ObjectiveStatus, ObjectiveStrategy};
use crate::domain::ports::ObjectiveRepository;

#[derive(Clone)]
pub struct SqliteObjectiveRepository {
    pool: SqlitePool,
}

impl SqliteObjectiveRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObjectiveRepository for SqliteObjectiveRepository {
    async fn create(&self, objective: &Objective) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO objectives (id, swarm_id, description, strategy, status, created_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(objective.id.to_string())
        .bind(objective.swarm_id.to_string())
        .bind(&objective.description)
        .bind(objective.strategy.as_str())
        .bind(objective.status.as_str())
        .bind(objective.created_at.to_rfc3339())
        .bind(objective.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Objective>> {
        let row: Option<ObjectiveRow> = sqlx::query_as("SELECT * FROM objectives WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, objective: &Objective) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE objectives SET description = ?, strategy = ?, status = ?, completed_at = ?
               WHERE id = ?"#,
        )
        .bind(&objective.description)
        .bind(objective.strategy.as_str())
        .bind(objective.status.as_str())
        .bind(objective.completed_at.map(|t| t.to_rfc3339()))
        .bind(objective.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ObjectiveNotFound(objective.id));
        }

        Ok(())
    }

    async fn list_by_swarm(&self, swarm_id: Uuid) -> DomainResult<Vec<Objective>> {
        let rows: Vec<ObjectiveRow> =
            sqlx::query_as("SELECT * FROM objectives WHERE swarm_id = ? ORDER BY created_at")
                .bind(swarm_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ObjectiveRow {
    id: String,
    swarm_id: String,
    description: String,
    strategy: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
}

impl TryFrom<ObjectiveRow> for Objective {
    type Error = DomainError;

    fn try_from(row: ObjectiveRow) -> Result<Self, Self::Error> {
        let strategy = ObjectiveStrategy::from_str(&row.strategy)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid strategy: {}", row.strategy)))?;
        let status = ObjectiveStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid status: {}", row.status)))?;

        Ok(Objective {
            id: super::parse_uuid(&row.id)?,
            swarm_id: super::parse_uuid(&row.swarm_id)?,
            description: row.description,
            strategy,
            status,
            created_at: super::parse_datetime(&row.created_at)?,
            completed_at: super::parse_optional_datetime(row.completed_at)?,
        })
    }
}
