//! SQLite database migration management.
//!
//! Migrations are additive only. Besides the embedded versioned SQL
//! files, the migrator runs a column-introspection pass that backfills
//! columns added after a table's first release (the session pid columns
//! are the observed case), logging one structured event per change.

use sqlx::{Row, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
    #[error("Failed to introspect table {table}: {source}")]
    IntrospectionError {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub sql: String,
}

pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_embedded_migrations(
        &self,
        migrations: Vec<Migration>,
    ) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let pending: Vec<_> = migrations
            .into_iter()
            .filter(|m| m.version > current_version)
            .collect();

        for migration in &pending {
            self.apply_migration(migration).await?;
        }

        self.ensure_session_pid_columns().await?;

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_optional(&self.pool)
                .await
                .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map(|(v,)| v).unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        sqlx::raw_sql(&migration.sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::ExecutionError {
                version: migration.version,
                source: e,
            })?;

        tracing::info!(
            version = migration.version,
            description = %migration.description,
            "Applied schema migration"
        );

        Ok(())
    }

    /// Backfill `parent_pid` and `child_pids` on `sessions` when absent.
    /// Databases created before those columns shipped gain them here.
    async fn ensure_session_pid_columns(&self) -> Result<(), MigrationError> {
        let columns = self.table_columns("sessions").await?;

        if !columns.iter().any(|c| c == "parent_pid") {
            sqlx::query("ALTER TABLE sessions ADD COLUMN parent_pid INTEGER NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await
                .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
            tracing::info!(table = "sessions", column = "parent_pid", "Added missing column");
        }

        if !columns.iter().any(|c| c == "child_pids") {
            sqlx::query("ALTER TABLE sessions ADD COLUMN child_pids TEXT NOT NULL DEFAULT '[]'")
                .execute(&self.pool)
                .await
                .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
            tracing::info!(table = "sessions", column = "child_pids", "Added missing column");
        }

        Ok(())
    }

    async fn table_columns(&self, table: &'static str) -> Result<Vec<String>, MigrationError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrationError::IntrospectionError { table, source: e })?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("name"))
            .collect())
    }
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema".to_string(),
        sql: include_str!("../../../migrations/001_initial_schema.sql").to_string(),
    }]
}
