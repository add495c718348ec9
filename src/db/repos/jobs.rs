use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{JobDefinition, NewJobDefinition},
};

/// Read access to the job catalog, plus the administrative insert used by
/// the `add-job` subcommand. The engine itself never mutates the catalog.
#[async_trait]
pub trait JobCatalogRepo: Send + Sync {
    /// All enabled jobs, ordered ascending by (processing_order, id).
    ///
    /// This ordering is how operators express referential-integrity
    /// constraints between related tables; the engine executes jobs
    /// strictly in this sequence.
    async fn list_enabled(&self) -> DbResult<Vec<JobDefinition>>;

    /// Every job regardless of the enabled flag, in catalog order.
    async fn list_all(&self) -> DbResult<Vec<JobDefinition>>;

    /// Insert a new job definition. Invariants (positive retention and
    /// batch size, target table present for ARCHIVE) are validated here
    /// at configuration time; the executor re-validates defensively.
    async fn create(&self, input: NewJobDefinition) -> DbResult<JobDefinition>;
}
