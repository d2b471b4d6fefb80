//! Workflow run models.

use portal_core::status::{StatusId, WorkflowRunStatus};
use portal_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `workflow_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkflowRun {
    pub id: DbId,
    pub workflow_id: DbId,
    pub status_id: StatusId,
    pub started_by_id: Option<DbId>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub archived_notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowRun {
    pub fn status(&self) -> Option<WorkflowRunStatus> {
        WorkflowRunStatus::from_id(self.status_id)
    }
}
