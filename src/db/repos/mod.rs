mod jobs;
mod run_log;

pub use jobs::JobCatalogRepo;
pub use run_log::RunLogRepo;
