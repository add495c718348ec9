use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Operational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    /// Use `:memory:` for an in-memory database (testing only).
    pub path: String,

    /// Create the database file if it doesn't exist.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,

    /// Run migrations for the engine's catalog/log tables on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,

    /// Enable WAL mode for better concurrency. Note that a cross-store
    /// batch commit is atomic across both files only in rollback-journal
    /// mode; WAL-mode files commit per-file.
    #[serde(default = "default_true")]
    pub wal_mode: bool,

    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::Validation(
                "database path cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u64 {
    5000 // 5 seconds
}

fn default_max_connections() -> u32 {
    5
}
