use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = Result<T, DbError>;
