//! Applies [`schema::MIGRATIONS`](super::schema::MIGRATIONS) in order,
//! recording each step in `schema_migrations`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use super::schema::{Migration, MIGRATIONS};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {name} failed: {source}")]
    StepFailed {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

const CREATE_LEDGER: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    name VARCHAR(255) PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// Record of an applied migration.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppliedMigration {
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies every pending step, each in its own transaction together with
    /// its ledger row. Returns how many were applied.
    pub async fn run_migrations(&self) -> Result<usize, MigrationError> {
        sqlx::query(CREATE_LEDGER).execute(&self.pool).await?;

        let applied: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT name FROM schema_migrations")
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .collect();

        let todo = pending(MIGRATIONS, &applied);
        debug!(pending = todo.len(), known = applied.len(), "Checked schema ledger");

        for migration in &todo {
            let mut tx = self.pool.begin().await?;
            sqlx::query(migration.sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| MigrationError::StepFailed {
                    name: migration.name,
                    source,
                })?;
            sqlx::query("INSERT INTO schema_migrations (name) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            info!(migration = migration.name, "Applied migration");
        }

        Ok(todo.len())
    }

    /// Applied steps, oldest first.
    pub async fn list_applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        sqlx::query(CREATE_LEDGER).execute(&self.pool).await?;
        Ok(sqlx::query_as(
            "SELECT name, applied_at FROM schema_migrations ORDER BY applied_at, name",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Steps from `all` not yet in `applied`, in declaration order.
fn pending<'a>(all: &'a [Migration], applied: &HashSet<String>) -> Vec<&'a Migration> {
    all.iter()
        .filter(|m| !applied.contains(m.name))
        .collect()
}
