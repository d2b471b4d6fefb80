//! Process run models.

use portal_core::status::{ProcessRunStatus, StatusId};
use portal_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// A row from the `process_runs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessRun {
    pub id: DbId,
    pub workflow_run_id: DbId,
    pub process_id: DbId,
    pub status_id: StatusId,
    pub data: Value,
    pub reset_process_text: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub submitted_by_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProcessRun {
    pub fn status(&self) -> Option<ProcessRunStatus> {
        ProcessRunStatus::from_id(self.status_id)
    }
}

/// Process run joined with its process name and order, as loaded for a
/// lifecycle snapshot.
#[derive(Debug, Clone, FromRow)]
pub struct ProcessRunRow {
    pub id: DbId,
    pub process_id: DbId,
    pub process_name: String,
    pub status_id: StatusId,
    pub data: Value,
}

/// One dependency edge between processes of a run.
#[derive(Debug, Clone, FromRow)]
pub struct DependencyRow {
    pub process_id: DbId,
    pub depends_on_id: DbId,
    pub depends_on_name: String,
}
