//! Run orchestrator and batch executor.
//!
//! One engine run is a single synchronous pass: derive the run number from
//! the execution log, load enabled jobs in catalog order, execute them one
//! at a time with per-job failure isolation, and append exactly one log
//! entry per job. Jobs never run concurrently; the catalog ordering is the
//! operators' referential-integrity contract and depends on sequential
//! execution.

mod batch;
mod error;

use std::time::Instant;

pub use batch::{BatchOutcome, run_job};
use chrono::{DateTime, Utc};
pub use error::EngineError;

use crate::{
    config::EngineConfig,
    db::CatalogDb,
    models::{JobAction, NewRunLogEntry},
    store::StoreRegistry,
};

/// Per-invocation knobs, resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pause between batches (load shedding).
    pub batch_pause: std::time::Duration,
    /// Wall-clock budget for the whole run; checked between batches and
    /// before each job, never inside a batch.
    pub deadline: Option<Instant>,
    /// Force dry-run for every job in this invocation.
    pub force_dry_run: bool,
}

impl RunOptions {
    pub fn from_config(config: &EngineConfig, force_dry_run: bool) -> Self {
        RunOptions {
            batch_pause: config.batch_pause(),
            deadline: config.max_runtime().map(|d| Instant::now() + d),
            force_dry_run,
        }
    }
}

/// Results from a single run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_number: i64,
    pub jobs_processed: usize,
    pub jobs_failed: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.jobs_failed > 0
    }
}

/// Execute one full run.
///
/// Errors returned here are fatal: the catalog could not be read, the log
/// could not be written, or a loaded ARCHIVE job references a linked-store
/// alias the configuration does not know. Individual job failures are
/// logged and swallowed; the summary reports how many there were.
pub async fn run_all(
    db: &CatalogDb,
    stores: &StoreRegistry,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<RunSummary, EngineError> {
    let run_log = db.run_log();
    let run_number = run_log.max_run_number().await? + 1;
    let jobs = db.jobs().list_enabled().await?;

    // Unresolvable aliases abort the run before any job mutates anything;
    // half-executing a misconfigured deployment is worse than skipping it.
    for job in &jobs {
        if job.action.parse::<JobAction>().ok() == Some(JobAction::Archive) {
            if let Some(alias) = &job.target_store {
                if stores.resolve(alias).is_none() {
                    return Err(EngineError::UnknownStore(alias.clone()));
                }
            }
        }
    }

    tracing::info!(
        run_number,
        jobs = jobs.len(),
        force_dry_run = opts.force_dry_run,
        "Starting retirement run"
    );

    let mut jobs_failed = 0;
    for job in &jobs {
        let started_at = Utc::now();
        let timer = Instant::now();

        let outcome = if opts.deadline.is_some_and(|d| Instant::now() >= d) {
            Err(EngineError::DeadlineExceeded)
        } else {
            run_job(job, stores, opts, now).await
        };
        let duration_ms = timer.elapsed().as_millis() as i64;

        let entry = match &outcome {
            Ok(outcome) => {
                tracing::info!(
                    run_number,
                    job_id = job.id,
                    table = %job.source_table,
                    action = %outcome.label,
                    rows = outcome.rows_affected,
                    duration_ms,
                    "Job complete"
                );
                NewRunLogEntry {
                    run_number,
                    job_id: job.id,
                    action: outcome.label.clone(),
                    source_table: job.source_table.clone(),
                    rows_affected: outcome.rows_affected,
                    dry_run: outcome.dry_run,
                    started_at,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                jobs_failed += 1;
                tracing::error!(
                    run_number,
                    job_id = job.id,
                    table = %job.source_table,
                    error = %e,
                    duration_ms,
                    "Job failed"
                );
                NewRunLogEntry {
                    run_number,
                    job_id: job.id,
                    action: "ERROR".into(),
                    source_table: job.source_table.clone(),
                    rows_affected: 0,
                    dry_run: job.dry_run || opts.force_dry_run,
                    started_at,
                    duration_ms,
                    error: Some(e.to_string()),
                }
            }
        };

        // One entry per enabled job per run, success or failure. A failing
        // append is fatal: an unauditable run must not continue.
        run_log.append(entry).await?;
    }

    let summary = RunSummary {
        run_number,
        jobs_processed: jobs.len(),
        jobs_failed,
    };
    tracing::info!(
        run_number,
        processed = summary.jobs_processed,
        failed = summary.jobs_failed,
        "Retirement run complete"
    );
    Ok(summary)
}
