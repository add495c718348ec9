use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::{error::DbResult, repos::RunLogRepo},
    models::{NewRunLogEntry, RunLogEntry},
};

pub struct SqliteRunLogRepo {
    pool: SqlitePool,
}

impl SqliteRunLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &SqliteRow) -> RunLogEntry {
    RunLogEntry {
        id: row.get("id"),
        run_number: row.get("run_number"),
        job_id: row.get("job_id"),
        action: row.get("action"),
        source_table: row.get("source_table"),
        rows_affected: row.get("rows_affected"),
        dry_run: row.get("dry_run"),
        started_at: row.get("started_at"),
        duration_ms: row.get("duration_ms"),
        error: row.get("error"),
    }
}

#[async_trait]
impl RunLogRepo for SqliteRunLogRepo {
    async fn max_run_number(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(run_number), 0) AS max_run FROM retire_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("max_run"))
    }

    async fn append(&self, entry: NewRunLogEntry) -> DbResult<RunLogEntry> {
        let result = sqlx::query(
            r#"
            INSERT INTO retire_log (
                run_number, job_id, action, source_table, rows_affected,
                dry_run, started_at, duration_ms, error
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.run_number)
        .bind(entry.job_id)
        .bind(&entry.action)
        .bind(&entry.source_table)
        .bind(entry.rows_affected)
        .bind(entry.dry_run)
        .bind(entry.started_at)
        .bind(entry.duration_ms)
        .bind(&entry.error)
        .execute(&self.pool)
        .await?;

        Ok(RunLogEntry {
            id: result.last_insert_rowid(),
            run_number: entry.run_number,
            job_id: entry.job_id,
            action: entry.action,
            source_table: entry.source_table,
            rows_affected: entry.rows_affected,
            dry_run: entry.dry_run,
            started_at: entry.started_at,
            duration_ms: entry.duration_ms,
            error: entry.error,
        })
    }

    async fn list_run(&self, run_number: i64) -> DbResult<Vec<RunLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, run_number, job_id, action, source_table, rows_affected,
                   dry_run, started_at, duration_ms, error
            FROM retire_log
            WHERE run_number = ?
            ORDER BY id
            "#,
        )
        .bind(run_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }
}
