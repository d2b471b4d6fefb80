//! Standalone form models.

use portal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use validator::Validate;

/// A row from the `forms` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Form {
    pub id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub schema: Value,
    pub is_public: bool,
    pub is_active: bool,
    pub responsible_team_id: Option<DbId>,
    pub review_form_permissions: String,
    pub edit_form_permissions: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateForm {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
    pub responsible_team_id: Option<DbId>,
    pub review_form_permissions: Option<String>,
    pub edit_form_permissions: Option<String>,
}

/// DTO for updating a form. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateForm {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub schema: Option<Value>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
    pub responsible_team_id: Option<DbId>,
    pub review_form_permissions: Option<String>,
    pub edit_form_permissions: Option<String>,
}
