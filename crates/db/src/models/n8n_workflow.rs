//! External automation workflows and their event bindings.

use portal_core::lifecycle::{Bindings, LifecycleEvent};
use portal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `n8n_workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct N8nWorkflow {
    pub id: DbId,
    /// Id of the workflow inside the automation engine; used in the webhook URL.
    pub workflow_id: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering an external workflow.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateN8nWorkflow {
    #[validate(length(min = 1, max = 255))]
    pub workflow_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// One row of `workflow_n8n_bindings` / `process_n8n_bindings` joined to the
/// external id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct N8nBinding {
    pub n8n_workflow_id: DbId,
    pub workflow_id: String,
    pub name: String,
    pub event: String,
}

/// Convert binding rows into lookup form. Rows with unknown event names are
/// skipped.
pub fn to_bindings(rows: &[N8nBinding]) -> Bindings {
    Bindings::new(
        rows.iter()
            .filter_map(|row| {
                row.event
                    .parse::<LifecycleEvent>()
                    .ok()
                    .map(|event| (event, row.workflow_id.clone()))
            })
            .collect(),
    )
}
