//! Form submission models.

use portal_core::form_lifecycle::SubmissionState;
use portal_core::status::{FormSubmissionStatus, StatusId};
use portal_core::types::{DbId, Timestamp};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// A row from the `form_submissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FormSubmission {
    pub id: DbId,
    pub form_id: DbId,
    pub status_id: StatusId,
    pub is_archived: bool,
    pub data: Value,
    pub submitted_by_id: Option<DbId>,
    pub submitted_at: Option<Timestamp>,
    pub reviewed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FormSubmission {
    pub fn status(&self) -> Option<FormSubmissionStatus> {
        FormSubmissionStatus::from_id(self.status_id)
    }

    /// Lifecycle view of the row; `None` when the status id is unknown.
    pub fn state(&self) -> Option<SubmissionState> {
        self.status().map(|status| SubmissionState {
            status,
            is_archived: self.is_archived,
        })
    }
}
