//! Process definition models.

use portal_core::process_tree::TreeItem;
use portal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `processes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Process {
    pub id: DbId,
    pub workflow_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub is_category: bool,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub schema: Option<Value>,
    pub theme: Option<Value>,
    pub responsible_team_id: Option<DbId>,
    pub edit_process_permissions: String,
    pub submit_process_permissions: String,
    pub view_process_permissions: String,
    pub reset_process_permissions: String,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TreeItem for Process {
    fn id(&self) -> DbId {
        self.id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }

    fn order(&self) -> i32 {
        self.sort_order
    }
}

/// DTO for creating a process inside a workflow.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateProcess {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub is_category: Option<bool>,
    pub parent_id: Option<DbId>,
    pub sort_order: Option<i32>,
    pub schema: Option<Value>,
    pub theme: Option<Value>,
    pub responsible_team_id: Option<DbId>,
    pub edit_process_permissions: Option<String>,
    pub submit_process_permissions: Option<String>,
    pub view_process_permissions: Option<String>,
    pub reset_process_permissions: Option<String>,
}

/// DTO for updating a process. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProcess {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_category: Option<bool>,
    pub parent_id: Option<DbId>,
    pub sort_order: Option<i32>,
    pub schema: Option<Value>,
    pub theme: Option<Value>,
    pub responsible_team_id: Option<DbId>,
    pub edit_process_permissions: Option<String>,
    pub submit_process_permissions: Option<String>,
    pub view_process_permissions: Option<String>,
    pub reset_process_permissions: Option<String>,
}
