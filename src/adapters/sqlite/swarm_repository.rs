//! SQLite implementation of the SwarmRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{QueenType, Swarm, SwarmStatus, SwarmTopology};
use crate::domain::ports::SwarmRepository;

#[derive(Clone)]
pub struct SqliteSwarmRepository {
    pool: SqlitePool,
}

impl SqliteSwarmRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SwarmRepository for SqliteSwarmRepository {
    async fn create(&self, swarm: &Swarm) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO swarms (id, name, topology, queen_type, status, max_workers, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(swarm.id.to_string())
        .bind(&swarm.name)
        .bind(swarm.topology.as_str())
        .bind(swarm.queen_type.as_str())
        .bind(swarm.status.as_str())
        .bind(i64::from(swarm.max_workers))
        .bind(swarm.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Swarm>> {
        let row: Option<SwarmRow> = sqlx::query_as("SELECT * FROM swarms WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, swarm: &Swarm) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE swarms SET name = ?, topology = ?, queen_type = ?, status = ?, max_workers = ?
               WHERE id = ?"#,
        )
        .bind(&swarm.name)
        .bind(swarm.topology.as_str())
        .bind(swarm.queen_type.as_str())
        .bind(swarm.status.as_str())
        .bind(i64::from(swarm.max_workers))
        .bind(swarm.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SwarmNotFound(swarm.id));
        }

        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: SwarmStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE swarms SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SwarmNotFound(id));
        }

        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Swarm>> {
        let rows: Vec<SwarmRow> = sqlx::query_as("SELECT * FROM swarms ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct SwarmRow {
    id: String,
    name: String,
    topology: String,
    queen_type: String,
    status: String,
    max_workers: i64,
    created_at: String,
}

impl TryFrom<SwarmRow> for Swarm {
    type Error = DomainError;

    fn try_from(row: SwarmRow) -> Result<Self, Self::Error> {
        let topology = SwarmTopology::from_str(&row.topology)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid topology: {}", row.topology)))?;
        let queen_type = QueenType::from_str(&row.queen_type)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid queen_type: {}", row.queen_type)))?;
        let status = SwarmStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::Serialization(format!("Invalid status: {}", row.status)))?;

        Ok(Swarm {
            id: super::parse_uuid(&row.id)?,
            name: row.name,
            topology,
            queen_type,
            status,
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            max_workers: row.max_workers as u32,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteSwarmRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteSwarmRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let swarm = Swarm::new("Alpha").with_topology(SwarmTopology::Mesh);

        repo.create(&swarm).await.unwrap();

        let loaded = repo.get(swarm.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Alpha");
        assert_eq!(loaded.topology, SwarmTopology::Mesh);
    }

    #[tokio::test]
    async fn test_update_status_cascade_target() {
        let repo = setup().await;
        let swarm = Swarm::new("Beta");
        repo.create(&swarm).await.unwrap();

        repo.update_status(swarm.id, SwarmStatus::Paused).await.unwrap();
        let loaded = repo.get(swarm.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SwarmStatus::Paused);
    }

    #[tokio::test]
    async fn test_update_unknown_swarm_errors() {
        let repo = setup().await;
        let err = repo
            .update_status(Uuid::new_v4(), SwarmStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SwarmNotFound(_)));
    }
}
