use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{NewRunLogEntry, RunLogEntry},
};

/// Append-only access to the execution log.
///
/// The engine only ever appends and reads the maximum run number; full
/// entries are read back by external reporting (the `history` subcommand).
#[async_trait]
pub trait RunLogRepo: Send + Sync {
    /// Highest run number present in the log, 0 when the log is empty.
    /// Each orchestrator invocation derives its run number as this + 1,
    /// so no in-memory counter survives between runs.
    async fn max_run_number(&self) -> DbResult<i64>;

    /// Append one outcome entry. Entries are immutable once written.
    async fn append(&self, entry: NewRunLogEntry) -> DbResult<RunLogEntry>;

    /// All entries of one run, in insertion order.
    async fn list_run(&self, run_number: i64) -> DbResult<Vec<RunLogEntry>>;
}
