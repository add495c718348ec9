use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::{
    db::{error::DbResult, repos::JobCatalogRepo},
    models::{JobAction, JobDefinition, NewJobDefinition},
};

pub struct SqliteJobCatalogRepo {
    pool: SqlitePool,
}

impl SqliteJobCatalogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const JOB_COLUMNS: &str = "id, source_schema, source_table, date_column, \
     target_store, target_schema, target_table, retention_days, batch_size, \
     action, dry_run, processing_order, enabled, notes";

fn job_from_row(row: &SqliteRow) -> JobDefinition {
    JobDefinition {
        id: row.get("id"),
        source_schema: row.get("source_schema"),
        source_table: row.get("source_table"),
        date_column: row.get("date_column"),
        target_store: row.get("target_store"),
        target_schema: row.get("target_schema"),
        target_table: row.get("target_table"),
        retention_days: row.get("retention_days"),
        batch_size: row.get("batch_size"),
        action: row.get("action"),
        dry_run: row.get("dry_run"),
        processing_order: row.get("processing_order"),
        enabled: row.get("enabled"),
        notes: row.get("notes"),
    }
}

#[async_trait]
impl JobCatalogRepo for SqliteJobCatalogRepo {
    async fn list_enabled(&self) -> DbResult<Vec<JobDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM retire_jobs \
             WHERE enabled = 1 \
             ORDER BY processing_order, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    async fn list_all(&self) -> DbResult<Vec<JobDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM retire_jobs ORDER BY processing_order, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(job_from_row).collect())
    }

    async fn create(&self, input: NewJobDefinition) -> DbResult<JobDefinition> {
        use crate::db::error::DbError;

        if input.retention_days <= 0 {
            return Err(DbError::Validation(
                "retention_days must be positive".into(),
            ));
        }
        if input.batch_size <= 0 {
            return Err(DbError::Validation("batch_size must be positive".into()));
        }
        if input.action == JobAction::Archive && input.target_table.is_none() {
            return Err(DbError::Validation(
                "ARCHIVE jobs require a target table".into(),
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO retire_jobs (
                source_schema, source_table, date_column,
                target_store, target_schema, target_table,
                retention_days, batch_size, action, dry_run,
                processing_order, enabled, notes
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.source_schema)
        .bind(&input.source_table)
        .bind(&input.date_column)
        .bind(&input.target_store)
        .bind(&input.target_schema)
        .bind(&input.target_table)
        .bind(input.retention_days)
        .bind(input.batch_size)
        .bind(input.action.to_string())
        .bind(input.dry_run)
        .bind(input.processing_order)
        .bind(input.enabled)
        .bind(&input.notes)
        .execute(&self.pool)
        .await?;

        Ok(JobDefinition {
            id: result.last_insert_rowid(),
            source_schema: input.source_schema,
            source_table: input.source_table,
            date_column: input.date_column,
            target_store: input.target_store,
            target_schema: input.target_schema,
            target_table: input.target_table,
            retention_days: input.retention_days,
            batch_size: input.batch_size,
            action: input.action.to_string(),
            dry_run: input.dry_run,
            processing_order: input.processing_order,
            enabled: input.enabled,
            notes: input.notes,
        })
    }
}
