//! Store connectors for the operational store and linked archive stores.
//!
//! The engine separates *where stores live* (this module) from *what a job
//! does to them* (`engine::batch`). A [`SourceStore`] opens a
//! [`BatchSession`] — one dedicated connection owning an explicit unit of
//! work. A [`LinkedStore`] joins an open session's transaction boundary by
//! attaching its database file under a validated alias, so one commit spans
//! both stores; the cross-store dependency is a type-level capability
//! instead of an implicit statement keyword.

mod session;

use std::collections::HashMap;

pub use session::BatchSession;
use sqlx::sqlite::SqliteConnectOptions;

use crate::{
    config::{DatabaseConfig, LinkedStoreConfig},
    db::{DbError, DbResult},
    ident::{IdentError, SqlIdent},
};

/// The operational store jobs retire rows from. Every batch session runs on
/// its own dedicated connection rather than a pooled one, so a failed batch
/// can discard the connection without poisoning a pool.
pub struct SourceStore {
    opts: SqliteConnectOptions,
}

impl SourceStore {
    fn from_config(config: &DatabaseConfig) -> Self {
        let opts = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            // Must agree with the pool's journal mode or the first batch
            // session would flip the file's mode.
            .journal_mode(if config.wal_mode {
                sqlx::sqlite::SqliteJournalMode::Wal
            } else {
                sqlx::sqlite::SqliteJournalMode::Delete
            })
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms));
        SourceStore { opts }
    }

    pub async fn open_session(&self) -> DbResult<BatchSession> {
        BatchSession::connect(self.opts.clone()).await
    }
}

/// A linked archive store, known to the catalog only by its alias.
#[derive(Debug)]
pub struct LinkedStore {
    alias: SqlIdent,
    path: String,
    create_if_missing: bool,
}

impl LinkedStore {
    /// The attach alias, which doubles as the target schema name in
    /// cross-store statements.
    pub fn schema(&self) -> &SqlIdent {
        &self.alias
    }

    /// Join an open session's transaction boundary by attaching this store
    /// under its alias. Must be called before `begin`; SQLite rejects
    /// ATTACH inside an open transaction.
    pub async fn join(&self, session: &mut BatchSession) -> DbResult<()> {
        if !self.create_if_missing && !std::path::Path::new(&self.path).exists() {
            return Err(DbError::Validation(format!(
                "linked store '{}' not found at {}",
                self.alias, self.path
            )));
        }
        session.attach(&self.path, &self.alias).await
    }
}

/// Resolves linked-store aliases from configuration. Built once at startup;
/// an alias referenced by the catalog that is missing here is a fatal error
/// before any job executes.
pub struct StoreRegistry {
    source: SourceStore,
    linked: HashMap<String, LinkedStore>,
}

impl StoreRegistry {
    pub fn from_config(
        database: &DatabaseConfig,
        stores: &HashMap<String, LinkedStoreConfig>,
    ) -> Result<Self, IdentError> {
        let mut linked = HashMap::new();
        for (alias, store) in stores {
            linked.insert(
                alias.clone(),
                LinkedStore {
                    alias: SqlIdent::new(alias)?,
                    path: store.path.clone(),
                    create_if_missing: store.create_if_missing,
                },
            );
        }
        Ok(StoreRegistry {
            source: SourceStore::from_config(database),
            linked,
        })
    }

    pub fn source(&self) -> &SourceStore {
        &self.source
    }

    pub fn resolve(&self, alias: &str) -> Option<&LinkedStore> {
        self.linked.get(alias)
    }
}
