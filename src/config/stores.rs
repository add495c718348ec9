use serde::{Deserialize, Serialize};

use super::ConfigError;

/// One linked archive store. The section key under `[stores.<alias>]` is
/// the alias that job rows reference in `target_store`; the deployment
/// environment supplies the path here, never the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkedStoreConfig {
    /// Path to the archive database file.
    pub path: String,

    /// Create the archive file if it doesn't exist.
    #[serde(default)]
    pub create_if_missing: bool,
}

impl LinkedStoreConfig {
    pub fn validate(&self, alias: &str) -> Result<(), ConfigError> {
        if self.path.is_empty() {
            return Err(ConfigError::Validation(format!(
                "store '{}': path cannot be empty",
                alias
            )));
        }
        Ok(())
    }
}
