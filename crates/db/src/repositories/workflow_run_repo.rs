//! Read and delete access to `workflow_runs`.
//!
//! Status changes go through [`crate::lifecycle`] only.

use portal_core::types::DbId;
use sqlx::PgPool;

use crate::models::workflow_run::WorkflowRun;

/// Column list for workflow_runs queries.
pub(crate) const COLUMNS: &str = "id, workflow_id, status_id, started_by_id, started_at, \
    completed_at, is_archived, archived_at, archived_notes, created_at, updated_at";

/// Provides read operations for workflow runs.
pub struct WorkflowRunRepo;

impl WorkflowRunRepo {
    /// Find a run by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WorkflowRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflow_runs WHERE id = $1");
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the runs of a workflow, newest first.
    pub async fn list_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
        include_archived: bool,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_runs
             WHERE workflow_id = $1 AND ($2 OR is_archived = FALSE)
             ORDER BY started_at DESC, id DESC"
        );
        sqlx::query_as::<_, WorkflowRun>(&query)
            .bind(workflow_id)
            .bind(include_archived)
            .fetch_all(pool)
            .await
    }
}
