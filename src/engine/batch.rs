//! Batch executor: runs a single job to completion.

use chrono::{DateTime, Utc};

use super::{EngineError, RunOptions};
use crate::{
    ident::{SqlIdent, TableRef},
    models::{JobAction, JobDefinition},
    store::{BatchSession, LinkedStore, StoreRegistry},
};

/// Result of one job invocation.
#[derive(Debug)]
pub struct BatchOutcome {
    pub rows_affected: i64,
    /// Effective action label for the log entry.
    pub label: String,
    pub dry_run: bool,
}

#[derive(Debug)]
struct TargetPlan<'a> {
    table: TableRef,
    /// Present for cross-store jobs; the store joins the batch session's
    /// transaction before any write.
    linked: Option<&'a LinkedStore>,
}

#[derive(Debug)]
enum PlanAction<'a> {
    Archive(TargetPlan<'a>),
    Delete,
}

/// A job definition with every untrusted fragment validated and every
/// locator resolved. Built fresh per invocation; catalog rows that fail
/// here become per-job errors, never fatal ones.
#[derive(Debug)]
struct JobPlan<'a> {
    source: TableRef,
    date_column: SqlIdent,
    action: PlanAction<'a>,
    batch_size: i64,
    dry_run: bool,
}

impl<'a> JobPlan<'a> {
    fn build(job: &JobDefinition, stores: &'a StoreRegistry) -> Result<Self, EngineError> {
        let action: JobAction = job
            .action
            .parse()
            .map_err(EngineError::InvalidJob)?;

        if job.retention_days <= 0 {
            return Err(EngineError::InvalidJob(
                "retention_days must be positive".into(),
            ));
        }
        if job.batch_size <= 0 {
            return Err(EngineError::InvalidJob("batch_size must be positive".into()));
        }

        let source = TableRef::new(&job.source_schema, &job.source_table)?;
        let date_column = SqlIdent::new(&job.date_column)?;

        let action = match action {
            JobAction::Delete => PlanAction::Delete,
            JobAction::Archive => {
                let table = job.target_table.as_deref().ok_or_else(|| {
                    EngineError::InvalidJob("ARCHIVE jobs require a target table".into())
                })?;
                let (schema, linked) = match &job.target_store {
                    Some(alias) => {
                        let linked = stores
                            .resolve(alias)
                            .ok_or_else(|| EngineError::UnknownStore(alias.clone()))?;
                        (linked.schema().clone(), Some(linked))
                    }
                    None => {
                        let schema = job
                            .target_schema
                            .as_deref()
                            .unwrap_or(&job.source_schema);
                        (SqlIdent::new(schema)?, None)
                    }
                };
                PlanAction::Archive(TargetPlan {
                    table: TableRef {
                        schema,
                        table: SqlIdent::new(table)?,
                    },
                    linked,
                })
            }
        };

        Ok(JobPlan {
            source,
            date_column,
            action,
            batch_size: job.batch_size,
            dry_run: job.dry_run,
        })
    }

    fn action_label(&self) -> JobAction {
        match self.action {
            PlanAction::Archive(_) => JobAction::Archive,
            PlanAction::Delete => JobAction::Delete,
        }
    }
}

/// Run one job: re-validate it, compute the cutoff once, then either count
/// (dry run) or drain expired rows in bounded transactional batches until a
/// batch affects zero rows.
///
/// Any error aborts the loop after rolling back the failing batch only;
/// batches committed earlier stay committed, which is what makes a rerun on
/// the next schedule resume where this one stopped.
pub async fn run_job(
    job: &JobDefinition,
    stores: &StoreRegistry,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<BatchOutcome, EngineError> {
    let plan = JobPlan::build(job, stores)?;
    let cutoff = job.cutoff(now);
    let dry_run = plan.dry_run || opts.force_dry_run;

    let mut session = stores.source().open_session().await?;

    // The count only touches the source, so a dry run never attaches the
    // archive store (ATTACH can create the file).
    if dry_run {
        let expired = session
            .count_expired(&plan.source, &plan.date_column, cutoff)
            .await?;
        return Ok(BatchOutcome {
            rows_affected: expired,
            label: format!("TEST-{}", plan.action_label()),
            dry_run: true,
        });
    }

    if let PlanAction::Archive(target) = &plan.action {
        if let Some(linked) = target.linked {
            linked.join(&mut session).await?;
        }
    }

    let mut total: u64 = 0;
    loop {
        if opts.deadline.is_some_and(|d| std::time::Instant::now() >= d) {
            return Err(EngineError::DeadlineExceeded);
        }

        session.begin().await?;
        match run_batch(&mut session, &plan, cutoff).await {
            Ok(0) => {
                session.rollback().await?;
                break;
            }
            Ok(rows) => {
                session.commit().await?;
                total += rows;
                tracing::debug!(
                    job_id = job.id,
                    table = %plan.source,
                    batch_rows = rows,
                    total,
                    "Batch committed"
                );
                if !opts.batch_pause.is_zero() {
                    tokio::time::sleep(opts.batch_pause).await;
                }
            }
            Err(e) => {
                if let Err(rb) = session.rollback().await {
                    tracing::warn!(job_id = job.id, error = %rb, "Rollback failed");
                }
                return Err(e);
            }
        }
    }

    Ok(BatchOutcome {
        rows_affected: i64::try_from(total).unwrap_or(i64::MAX),
        label: plan.action_label().to_string(),
        dry_run: false,
    })
}

/// One bounded batch inside an already-open unit of work.
async fn run_batch(
    session: &mut BatchSession,
    plan: &JobPlan<'_>,
    cutoff: DateTime<Utc>,
) -> Result<u64, EngineError> {
    match &plan.action {
        PlanAction::Delete => Ok(session
            .delete_expired(&plan.source, &plan.date_column, cutoff, plan.batch_size)
            .await?),
        PlanAction::Archive(target) => {
            let rowids = session
                .expired_rowids(&plan.source, &plan.date_column, cutoff, plan.batch_size)
                .await?;
            if rowids.is_empty() {
                return Ok(0);
            }
            let copied = session
                .copy_rows(&plan.source, &target.table, &rowids)
                .await?;
            let deleted = session.delete_rows(&plan.source, &rowids).await?;
            let expected = rowids.len() as u64;
            if copied != expected || deleted != expected {
                return Err(EngineError::CopyDeleteMismatch { copied, deleted });
            }
            Ok(deleted)
        }
    }
}
