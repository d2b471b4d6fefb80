//! Workflow definition models.

use portal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `workflows` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workflow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_public: bool,
    pub responsible_team_id: Option<DbId>,
    pub edit_workflow_permissions: String,
    pub submit_process_permissions: String,
    /// Ordered list of `{label, fieldKey}` summary columns.
    pub information: Value,
    pub initialize_process_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a workflow.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWorkflow {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub responsible_team_id: Option<DbId>,
    pub edit_workflow_permissions: Option<String>,
    pub submit_process_permissions: Option<String>,
    pub information: Option<Value>,
}

/// DTO for updating a workflow. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWorkflow {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub responsible_team_id: Option<DbId>,
    pub edit_workflow_permissions: Option<String>,
    pub submit_process_permissions: Option<String>,
    pub information: Option<Value>,
    pub initialize_process_id: Option<DbId>,
}
