mod job;
mod run_log;

pub use job::{JobAction, JobDefinition, NewJobDefinition};
pub use run_log::{NewRunLogEntry, RunLogEntry};
