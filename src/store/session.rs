use chrono::{DateTime, Utc};
use sqlx::{ConnectOptions, Row, SqliteConnection, sqlite::SqliteConnectOptions};

use crate::{
    db::{DbError, DbResult},
    ident::{SqlIdent, TableRef},
};

/// One unit of work against the operational store, optionally spanning an
/// attached archive store.
///
/// The session owns a dedicated connection and an explicit transaction
/// (`begin` / `commit` / `rollback`). Identifier fragments reaching the
/// statements here are pre-validated [`SqlIdent`]s / [`TableRef`]s and are
/// quoted; cutoffs, limits and rowids are always bound parameters.
///
/// When an archive store has joined via ATTACH, a commit covers both files
/// in one SQLite commit. That commit is atomic across files in
/// rollback-journal mode; WAL-mode files commit per-file.
///
/// Rowid capture means source tables must be ordinary rowid tables
/// (`WITHOUT ROWID` tables are not supported).
pub struct BatchSession {
    conn: SqliteConnection,
    in_txn: bool,
}

impl BatchSession {
    pub(crate) async fn connect(opts: SqliteConnectOptions) -> DbResult<Self> {
        let conn = opts.connect().await?;
        Ok(BatchSession {
            conn,
            in_txn: false,
        })
    }

    pub(crate) async fn attach(&mut self, path: &str, alias: &SqlIdent) -> DbResult<()> {
        if self.in_txn {
            return Err(DbError::Validation(
                "cannot attach a store inside an open transaction".into(),
            ));
        }
        sqlx::query(&format!("ATTACH DATABASE ? AS {}", alias.quoted()))
            .bind(path)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    /// Begin the unit of work. IMMEDIATE takes the write lock up front so a
    /// batch never upgrades mid-flight.
    pub async fn begin(&mut self) -> DbResult<()> {
        sqlx::query("BEGIN IMMEDIATE").execute(&mut self.conn).await?;
        self.in_txn = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> DbResult<()> {
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        self.in_txn = false;
        Ok(())
    }

    pub async fn rollback(&mut self) -> DbResult<()> {
        sqlx::query("ROLLBACK").execute(&mut self.conn).await?;
        self.in_txn = false;
        Ok(())
    }

    /// Count rows past the cutoff. Used by the dry-run branch; runs outside
    /// any transaction and mutates nothing.
    pub async fn count_expired(
        &mut self,
        table: &TableRef,
        column: &SqlIdent,
        cutoff: DateTime<Utc>,
    ) -> DbResult<i64> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS expired FROM {} WHERE {} < ?",
            table.qualified(),
            column.quoted()
        ))
        .bind(cutoff)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(row.get("expired"))
    }

    /// Capture up to `limit` rowids of expired rows. The captured set — not
    /// a re-evaluation of the cutoff predicate — is what a copy-then-delete
    /// batch operates on, so a row qualifying between copy and delete can
    /// never be deleted without having been copied.
    pub async fn expired_rowids(
        &mut self,
        table: &TableRef,
        column: &SqlIdent,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<i64>> {
        let rows = sqlx::query(&format!(
            "SELECT rowid AS rid FROM {} WHERE {} < ? LIMIT ?",
            table.qualified(),
            column.quoted()
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&mut self.conn)
        .await?;
        Ok(rows.iter().map(|r| r.get("rid")).collect())
    }

    /// Copy exactly the captured rows into the target table.
    pub async fn copy_rows(
        &mut self,
        source: &TableRef,
        target: &TableRef,
        rowids: &[i64],
    ) -> DbResult<u64> {
        if rowids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "INSERT INTO {} SELECT * FROM {} WHERE rowid IN ({})",
            target.qualified(),
            source.qualified(),
            placeholders(rowids.len())
        );
        let mut query = sqlx::query(&sql);
        for rid in rowids {
            query = query.bind(rid);
        }
        Ok(query.execute(&mut self.conn).await?.rows_affected())
    }

    /// Delete exactly the captured rows from the source table.
    pub async fn delete_rows(&mut self, table: &TableRef, rowids: &[i64]) -> DbResult<u64> {
        if rowids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {} WHERE rowid IN ({})",
            table.qualified(),
            placeholders(rowids.len())
        );
        let mut query = sqlx::query(&sql);
        for rid in rowids {
            query = query.bind(rid);
        }
        Ok(query.execute(&mut self.conn).await?.rows_affected())
    }

    /// Delete up to `limit` expired rows via a rowid subquery. The
    /// delete-only batch shape; no capture needed since nothing is copied.
    pub async fn delete_expired(
        &mut self,
        table: &TableRef,
        column: &SqlIdent,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<u64> {
        let sql = format!(
            "DELETE FROM {t} WHERE rowid IN (SELECT rowid FROM {t} WHERE {c} < ? LIMIT ?)",
            t = table.qualified(),
            c = column.quoted()
        );
        Ok(sqlx::query(&sql)
            .bind(cutoff)
            .bind(limit)
            .execute(&mut self.conn)
            .await?
            .rows_affected())
    }
}

fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}
