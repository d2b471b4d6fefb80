//! Team models.

use portal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `teams` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Team {
    pub id: DbId,
    pub name: String,
    pub contact_email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a team.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTeam {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub contact_email: Option<String>,
}

/// A member of a team, as listed on the team page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub user_id: DbId,
    pub name: String,
    pub email: String,
}
