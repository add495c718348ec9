use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Run-loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Pause between batches in milliseconds. Lets the store's journal and
    /// any replication catch up between deletes.
    /// Default: 250
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Wall-clock budget for one run, checked between batches and before
    /// each job; a batch is never interrupted mid-flight.
    /// Set to 0 for no deadline.
    /// Default: 0
    #[serde(default)]
    pub max_runtime_minutes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_pause_ms: default_batch_pause_ms(),
            max_runtime_minutes: 0,
        }
    }
}

fn default_batch_pause_ms() -> u64 {
    250
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_pause_ms > 60_000 {
            return Err(ConfigError::Validation(
                "batch_pause_ms must be at most 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn batch_pause(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.batch_pause_ms)
    }

    pub fn max_runtime(&self) -> Option<std::time::Duration> {
        if self.max_runtime_minutes == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.max_runtime_minutes * 60))
        }
    }
}
