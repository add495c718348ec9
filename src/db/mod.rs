mod error;
pub mod repos;
pub mod sqlite;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    jobs: Arc<dyn JobCatalogRepo>,
    run_log: Arc<dyn RunLogRepo>,
}

/// Pool over the operational store, which also hosts the engine's own
/// catalog and log tables.
///
/// Repositories are cached at construction time to avoid allocation on each
/// access.
pub struct CatalogDb {
    pool: sqlx::SqlitePool,
    repos: CachedRepos,
}

impl CatalogDb {
    /// Create a CatalogDb from an existing pool. Primarily useful for testing.
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos {
            jobs: Arc::new(sqlite::SqliteJobCatalogRepo::new(pool.clone())),
            run_log: Arc::new(sqlite::SqliteRunLogRepo::new(pool.clone())),
        };
        CatalogDb { pool, repos }
    }

    /// Create a pool from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(config.create_if_missing)
                    .journal_mode(if config.wal_mode {
                        sqlx::sqlite::SqliteJournalMode::Wal
                    } else {
                        sqlx::sqlite::SqliteJournalMode::Delete
                    })
                    .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms)),
            )
            .await?;

        Ok(Self::from_pool(pool))
    }

    /// Run migrations for the engine's own tables using sqlx's migration
    /// runner. This automatically creates and manages a _sqlx_migrations
    /// table; user tables are never touched.
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running catalog migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("Catalog migrations completed");
        Ok(())
    }

    /// Get the job catalog repository.
    pub fn jobs(&self) -> Arc<dyn JobCatalogRepo> {
        Arc::clone(&self.repos.jobs)
    }

    /// Get the execution log repository.
    pub fn run_log(&self) -> Arc<dyn RunLogRepo> {
        Arc::clone(&self.repos.run_log)
    }

    /// Direct pool access for tests and store setup.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Health check for database connectivity.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
