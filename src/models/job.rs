use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a retire job does with expired rows.
///
/// Stored in the catalog as `ARCHIVE` / `DELETE`; those strings are also the
/// effective action labels in the execution log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    /// Copy expired rows to the target table, then delete exactly the rows
    /// that were copied, inside one unit of work.
    Archive,
    /// Delete expired rows without copying them anywhere.
    Delete,
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobAction::Archive => write!(f, "ARCHIVE"),
            JobAction::Delete => write!(f, "DELETE"),
        }
    }
}

impl std::str::FromStr for JobAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARCHIVE" => Ok(JobAction::Archive),
            "DELETE" => Ok(JobAction::Delete),
            _ => Err(format!("invalid action '{}'", s)),
        }
    }
}

/// One row of the job catalog.
///
/// `action` is kept as the raw catalog string so a malformed row surfaces as
/// a per-job error at execution time instead of making the whole catalog
/// unreadable; the executor parses it when it builds the job plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: i64,
    /// SQLite schema holding the source table, normally `main`.
    pub source_schema: String,
    pub source_table: String,
    /// Column compared against the retention cutoff.
    pub date_column: String,
    /// Linked-store alias; `None` means the target lives in the same store.
    pub target_store: Option<String>,
    /// Ignored for cross-store jobs, where the attach alias is the schema.
    pub target_schema: Option<String>,
    pub target_table: Option<String>,
    pub retention_days: i64,
    pub batch_size: i64,
    pub action: String,
    pub dry_run: bool,
    /// Jobs run in ascending (processing_order, id) order. For ARCHIVE jobs
    /// parents must carry a lower order than children; for DELETE jobs the
    /// reverse. The engine trusts this ordering and never verifies it
    /// against foreign-key topology.
    pub processing_order: i64,
    pub enabled: bool,
    pub notes: Option<String>,
}

impl JobDefinition {
    /// Retention cutoff for this invocation. Computed exactly once per job
    /// so a long-running batch loop keeps a stable boundary.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.retention_days)
    }
}

/// Input for creating a catalog row through the `add-job` subcommand.
#[derive(Debug, Clone)]
pub struct NewJobDefinition {
    pub source_schema: String,
    pub source_table: String,
    pub date_column: String,
    pub target_store: Option<String>,
    pub target_schema: Option<String>,
    pub target_table: Option<String>,
    pub retention_days: i64,
    pub batch_size: i64,
    pub action: JobAction,
    pub dry_run: bool,
    pub processing_order: i64,
    pub enabled: bool,
    pub notes: Option<String>,
}
