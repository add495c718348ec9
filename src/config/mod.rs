//! TOML configuration for the engine.
//!
//! ```toml
//! [database]
//! path = "/var/lib/coldsweep/operational.db"
//! wal_mode = false # required when linked stores are configured
//!
//! [stores.coldvault]
//! path = "/var/lib/coldsweep/coldvault.db"
//!
//! [engine]
//! batch_pause_ms = 250
//! max_runtime_minutes = 0
//! ```

mod database;
mod engine;
mod stores;

use std::collections::HashMap;

pub use database::DatabaseConfig;
pub use engine::EngineConfig;
use serde::{Deserialize, Serialize};
pub use stores::LinkedStoreConfig;

use crate::ident::SqlIdent;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// The operational store. The engine's catalog and log tables live here
    /// alongside the user tables that jobs retire rows from.
    pub database: DatabaseConfig,

    /// Linked archive stores, keyed by the alias that job rows reference.
    /// The catalog never holds paths or credentials, only these aliases.
    #[serde(default)]
    pub stores: HashMap<String, LinkedStoreConfig>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e, path.to_path_buf()))?;
        let config: AppConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.engine.validate()?;
        for (alias, store) in &self.stores {
            // The alias becomes the ATTACH schema name in cross-store
            // statements, so it obeys the same allow-list as table names.
            SqlIdent::new(alias).map_err(|e| {
                ConfigError::Validation(format!("store alias '{}': {}", alias, e))
            })?;
            store.validate(alias)?;
        }
        // A cross-store commit is atomic across files only in
        // rollback-journal mode; WAL would silently commit per-file.
        if !self.stores.is_empty() && self.database.wal_mode {
            return Err(ConfigError::Validation(
                "linked stores require wal_mode = false on the database".into(),
            ));
        }
        Ok(())
    }
}
