//! Read access to `process_runs`.

use portal_core::types::DbId;
use sqlx::PgPool;

use crate::models::process_run::ProcessRun;

/// Column list for process_runs queries.
pub(crate) const COLUMNS: &str = "id, workflow_run_id, process_id, status_id, data, \
    reset_process_text, started_at, completed_at, submitted_by_id, created_at, updated_at";

/// Provides read operations for process runs.
pub struct ProcessRunRepo;

impl ProcessRunRepo {
    /// Find a process run by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProcessRun>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM process_runs WHERE id = $1");
        sqlx::query_as::<_, ProcessRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the process runs of a workflow run in process order.
    pub async fn list_for_run(
        pool: &PgPool,
        workflow_run_id: DbId,
    ) -> Result<Vec<ProcessRun>, sqlx::Error> {
        sqlx::query_as::<_, ProcessRun>(
            "SELECT pr.id, pr.workflow_run_id, pr.process_id, pr.status_id, pr.data,
                    pr.reset_process_text, pr.started_at, pr.completed_at,
                    pr.submitted_by_id, pr.created_at, pr.updated_at
             FROM process_runs pr
             JOIN processes p ON p.id = pr.process_id
             WHERE pr.workflow_run_id = $1
             ORDER BY p.sort_order ASC, p.id ASC",
        )
        .bind(workflow_run_id)
        .fetch_all(pool)
        .await
    }
}
