use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution log entry: the outcome of one job in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i64,
    /// Grouping key for one orchestrator invocation.
    pub run_number: i64,
    pub job_id: i64,
    /// Effective action label: `ARCHIVE`, `DELETE`, a `TEST-` prefixed
    /// variant for dry runs, or `ERROR`.
    pub action: String,
    pub source_table: String,
    pub rows_affected: i64,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub error: Option<String>,
}

/// Input for appending a log entry. Immutable once written.
#[derive(Debug, Clone)]
pub struct NewRunLogEntry {
    pub run_number: i64,
    pub job_id: i64,
    pub action: String,
    pub source_table: String,
    pub rows_affected: i64,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub error: Option<String>,
}
