use thiserror::Error;

use crate::{db::DbError, ident::IdentError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid job configuration: {0}")]
    InvalidJob(String),

    #[error("unknown linked store alias '{0}'")]
    UnknownStore(String),

    #[error(transparent)]
    Ident(#[from] IdentError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("run deadline exceeded")]
    DeadlineExceeded,

    #[error("archive batch copied {copied} rows but deleted {deleted}")]
    CopyDeleteMismatch { copied: u64, deleted: u64 },
}
