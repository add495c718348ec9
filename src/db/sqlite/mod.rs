mod jobs;
mod run_log;

pub use jobs::SqliteJobCatalogRepo;
pub use run_log::SqliteRunLogRepo;
