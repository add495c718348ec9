//! End-to-end engine tests against real SQLite files on disk.
//!
//! Each test builds a throwaway catalog store in a temp directory, seeds
//! user tables and job definitions through the public surfaces, then drives
//! one or more full runs through [`engine::run_all`] and asserts on the
//! execution log and the surviving rows.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::{ConnectOptions, sqlite::SqliteConnectOptions};
use tempfile::TempDir;

use crate::{
    config::{DatabaseConfig, LinkedStoreConfig},
    db::CatalogDb,
    engine::{self, EngineError, RunOptions},
    models::{JobAction, JobDefinition, NewJobDefinition},
    store::StoreRegistry,
};

struct Harness {
    dir: TempDir,
    db: CatalogDb,
    database: DatabaseConfig,
    stores: HashMap<String, LinkedStoreConfig>,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = DatabaseConfig {
            path: dir
                .path()
                .join("catalog.db")
                .to_string_lossy()
                .into_owned(),
            create_if_missing: true,
            run_migrations: true,
            // Cross-store commits are only atomic in rollback-journal mode.
            wal_mode: false,
            busy_timeout_ms: 5000,
            max_connections: 5,
        };
        let db = CatalogDb::from_config(&database).await.unwrap();
        db.health_check().await.unwrap();
        db.run_migrations().await.unwrap();
        Harness {
            dir,
            db,
            database,
            stores: HashMap::new(),
        }
    }

    /// Register a linked archive store and create its file with a `table`
    /// archive table matching [`Harness::seed_table`]'s layout.
    async fn with_linked_store(&mut self, alias: &str, table: &str) {
        let path = self
            .dir
            .path()
            .join(format!("{alias}.db"))
            .to_string_lossy()
            .into_owned();
        let mut conn = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        sqlx::query(&format!(
            "CREATE TABLE {table} (id INTEGER PRIMARY KEY, created_at TEXT NOT NULL, payload TEXT)"
        ))
        .execute(&mut conn)
        .await
        .unwrap();
        self.stores.insert(
            alias.to_string(),
            LinkedStoreConfig {
                path,
                create_if_missing: false,
            },
        );
    }

    /// Create a user table and populate it with `expired` rows 40 days old
    /// and `fresh` rows 1 day old, stamped relative to `now`.
    async fn seed_table(&self, table: &str, now: DateTime<Utc>, expired: i64, fresh: i64) {
        sqlx::query(&format!(
            "CREATE TABLE {table} (id INTEGER PRIMARY KEY, created_at TEXT NOT NULL, payload TEXT)"
        ))
        .execute(self.db.pool())
        .await
        .unwrap();
        for i in 0..expired {
            sqlx::query(&format!(
                "INSERT INTO {table} (created_at, payload) VALUES (?, ?)"
            ))
            .bind(now - Duration::days(40))
            .bind(format!("old-{i}"))
            .execute(self.db.pool())
            .await
            .unwrap();
        }
        for i in 0..fresh {
            sqlx::query(&format!(
                "INSERT INTO {table} (created_at, payload) VALUES (?, ?)"
            ))
            .bind(now - Duration::days(1))
            .bind(format!("new-{i}"))
            .execute(self.db.pool())
            .await
            .unwrap();
        }
    }

    async fn add_job(&self, input: NewJobDefinition) -> JobDefinition {
        self.db.jobs().create(input).await.unwrap()
    }

    fn registry(&self) -> StoreRegistry {
        StoreRegistry::from_config(&self.database, &self.stores).unwrap()
    }

    fn opts(&self) -> RunOptions {
        RunOptions {
            batch_pause: std::time::Duration::ZERO,
            deadline: None,
            force_dry_run: false,
        }
    }

    async fn rows_in(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }
}

fn delete_job(table: &str) -> NewJobDefinition {
    NewJobDefinition {
        source_schema: "main".into(),
        source_table: table.into(),
        date_column: "created_at".into(),
        target_store: None,
        target_schema: None,
        target_table: None,
        retention_days: 30,
        batch_size: 1000,
        action: JobAction::Delete,
        dry_run: false,
        processing_order: 100,
        enabled: true,
        notes: None,
    }
}

fn archive_job(table: &str, target_table: &str) -> NewJobDefinition {
    NewJobDefinition {
        target_table: Some(target_table.into()),
        action: JobAction::Archive,
        ..delete_job(table)
    }
}

#[tokio::test]
async fn delete_job_drains_expired_rows_across_batches() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("orders", now, 55, 45).await;
    h.add_job(NewJobDefinition {
        batch_size: 30,
        ..delete_job("orders")
    })
    .await;

    // 55 expired rows, batch 30: batches of 30, 25, then 0 to stop.
    let summary = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(summary.run_number, 1);
    assert_eq!(summary.jobs_processed, 1);
    assert_eq!(summary.jobs_failed, 0);
    assert_eq!(h.rows_in("orders").await, 45);

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "DELETE");
    assert_eq!(entries[0].rows_affected, 55);
    assert!(!entries[0].dry_run);
    assert!(entries[0].error.is_none());
}

#[tokio::test]
async fn run_numbers_increment_across_invocations() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("sessions", now, 3, 2).await;
    h.add_job(delete_job("sessions")).await;

    let first = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    let second = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(first.run_number, 1);
    assert_eq!(second.run_number, 2);

    // Nothing left to retire on the second pass.
    let entries = h.db.run_log().list_run(2).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].rows_affected, 0);
    assert_eq!(h.rows_in("sessions").await, 2);
}

#[tokio::test]
async fn jobs_execute_in_processing_order_with_id_tiebreak() {
    let h = Harness::new().await;
    let now = Utc::now();
    for table in ["alpha", "beta", "gamma"] {
        h.seed_table(table, now, 1, 0).await;
    }
    // alpha gets the highest order but the lowest id; beta and gamma tie.
    h.add_job(NewJobDefinition {
        processing_order: 200,
        ..delete_job("alpha")
    })
    .await;
    h.add_job(NewJobDefinition {
        processing_order: 100,
        ..delete_job("beta")
    })
    .await;
    h.add_job(NewJobDefinition {
        processing_order: 100,
        ..delete_job("gamma")
    })
    .await;

    engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();

    let entries = h.db.run_log().list_run(1).await.unwrap();
    let order: Vec<&str> = entries.iter().map(|e| e.source_table.as_str()).collect();
    assert_eq!(order, ["beta", "gamma", "alpha"]);
}

#[tokio::test]
async fn failed_job_does_not_stop_the_run() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("events", now, 4, 1).await;
    // processing_order puts the broken job first.
    h.add_job(NewJobDefinition {
        processing_order: 10,
        ..delete_job("ghost")
    })
    .await;
    h.add_job(delete_job("events")).await;

    let summary = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(summary.jobs_processed, 2);
    assert_eq!(summary.jobs_failed, 1);

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].source_table, "ghost");
    assert_eq!(entries[0].action, "ERROR");
    assert_eq!(entries[0].rows_affected, 0);
    assert!(entries[0].error.is_some());
    assert_eq!(entries[1].source_table, "events");
    assert_eq!(entries[1].action, "DELETE");
    assert_eq!(entries[1].rows_affected, 4);
    assert_eq!(h.rows_in("events").await, 1);
}

#[tokio::test]
async fn dry_run_counts_without_mutating() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("audit", now, 55, 45).await;
    h.add_job(NewJobDefinition {
        dry_run: true,
        ..delete_job("audit")
    })
    .await;

    engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries[0].action, "TEST-DELETE");
    assert_eq!(entries[0].rows_affected, 55);
    assert!(entries[0].dry_run);
    assert_eq!(h.rows_in("audit").await, 100);
}

#[tokio::test]
async fn force_dry_run_overrides_catalog_flag() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("audit", now, 5, 5).await;
    h.add_job(delete_job("audit")).await;

    let opts = RunOptions {
        force_dry_run: true,
        ..h.opts()
    };
    engine::run_all(&h.db, &h.registry(), &opts, now)
        .await
        .unwrap();

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries[0].action, "TEST-DELETE");
    assert!(entries[0].dry_run);
    assert_eq!(h.rows_in("audit").await, 10);
}

#[tokio::test]
async fn expired_deadline_skips_jobs_but_still_logs_each() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("orders", now, 5, 5).await;
    h.seed_table("sessions", now, 3, 0).await;
    h.add_job(delete_job("orders")).await;
    h.add_job(delete_job("sessions")).await;

    // Deadline already in the past: no job may start, but the log still
    // receives one entry per enabled job.
    let opts = RunOptions {
        deadline: Some(std::time::Instant::now()),
        ..h.opts()
    };
    let summary = engine::run_all(&h.db, &h.registry(), &opts, now)
        .await
        .unwrap();
    assert_eq!(summary.jobs_processed, 2);
    assert_eq!(summary.jobs_failed, 2);

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.action, "ERROR");
        assert_eq!(entry.rows_affected, 0);
        assert!(entry.error.as_deref().unwrap().contains("deadline"));
    }
    assert_eq!(h.rows_in("orders").await, 10);
    assert_eq!(h.rows_in("sessions").await, 3);
}

#[tokio::test]
async fn same_store_archive_moves_rows_and_is_idempotent() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("orders", now, 55, 45).await;
    sqlx::query(
        "CREATE TABLE orders_archive (id INTEGER PRIMARY KEY, created_at TEXT NOT NULL, payload TEXT)",
    )
    .execute(h.db.pool())
    .await
    .unwrap();
    h.add_job(NewJobDefinition {
        batch_size: 30,
        ..archive_job("orders", "orders_archive")
    })
    .await;

    engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    // Every expired row moved, none duplicated, none lost.
    assert_eq!(h.rows_in("orders").await, 45);
    assert_eq!(h.rows_in("orders_archive").await, 55);

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries[0].action, "ARCHIVE");
    assert_eq!(entries[0].rows_affected, 55);

    // A second run finds nothing expired and changes nothing.
    engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(h.rows_in("orders").await, 45);
    assert_eq!(h.rows_in("orders_archive").await, 55);
    let entries = h.db.run_log().list_run(2).await.unwrap();
    assert_eq!(entries[0].rows_affected, 0);
}

#[tokio::test]
async fn cross_store_archive_lands_in_linked_file() {
    let mut h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("invoices", now, 7, 3).await;
    h.with_linked_store("vault", "invoices_archive").await;
    h.add_job(NewJobDefinition {
        target_store: Some("vault".into()),
        ..archive_job("invoices", "invoices_archive")
    })
    .await;

    let summary = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(summary.jobs_failed, 0);
    assert_eq!(h.rows_in("invoices").await, 3);

    // Reopen the archive file independently and count what landed.
    let mut conn = SqliteConnectOptions::new()
        .filename(&h.stores["vault"].path)
        .connect()
        .await
        .unwrap();
    let archived: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices_archive")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(archived, 7);
}

#[tokio::test]
async fn dry_run_of_cross_store_archive_never_touches_the_archive() {
    let mut h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("invoices", now, 4, 2).await;

    // The store is configured but its file was never created; a dry run
    // must not attach it, since ATTACH would create the file.
    let vault_path = h
        .dir
        .path()
        .join("vault.db")
        .to_string_lossy()
        .into_owned();
    h.stores.insert(
        "vault".to_string(),
        LinkedStoreConfig {
            path: vault_path.clone(),
            create_if_missing: true,
        },
    );
    h.add_job(NewJobDefinition {
        target_store: Some("vault".into()),
        dry_run: true,
        ..archive_job("invoices", "invoices_archive")
    })
    .await;

    let summary = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap();
    assert_eq!(summary.jobs_failed, 0);

    let entries = h.db.run_log().list_run(1).await.unwrap();
    assert_eq!(entries[0].action, "TEST-ARCHIVE");
    assert_eq!(entries[0].rows_affected, 4);
    assert_eq!(h.rows_in("invoices").await, 6);
    assert!(!std::path::Path::new(&vault_path).exists());
}

#[tokio::test]
async fn unknown_store_alias_aborts_before_any_job() {
    let h = Harness::new().await;
    let now = Utc::now();
    h.seed_table("orders", now, 5, 5).await;
    h.add_job(NewJobDefinition {
        target_store: Some("nowhere".into()),
        ..archive_job("orders", "orders_archive")
    })
    .await;
    h.add_job(NewJobDefinition {
        processing_order: 10,
        ..delete_job("orders")
    })
    .await;

    let err = engine::run_all(&h.db, &h.registry(), &h.opts(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownStore(alias) if alias == "nowhere"));

    // Nothing ran and nothing was logged, not even the healthy job.
    assert_eq!(h.db.run_log().max_run_number().await.unwrap(), 0);
    assert_eq!(h.rows_in("orders").await, 10);
}
