//! HTTP handlers, one module per resource.

pub mod forms;
pub mod n8n;
pub mod process_runs;
pub mod processes;
pub mod submissions;
pub mod teams;
pub mod workflow_runs;
pub mod workflows;

use portal_core::error::CoreError;
use portal_core::permissions::Principal;
use portal_core::roles::Role;
use portal_core::types::DbId;
use portal_db::repositories::{ScopeOwner, TeamRepo};
use serde_json::Value;
use sqlx::PgPool;

use crate::error::AppResult;

const MSG_DATA_NOT_OBJECT: &str = "Daten müssen ein JSON-Objekt sein";

/// Whether a workflow or form shows up in the caller's catalogue.
///
/// Moderators see everything. Everyone else sees active entries that are
/// public or assigned to one of their teams.
pub(crate) async fn is_listed_for(
    pool: &PgPool,
    principal: &Principal,
    owner: ScopeOwner,
    id: DbId,
    is_active: bool,
    is_public: bool,
) -> Result<bool, sqlx::Error> {
    if principal.role.meets(Role::Moderator) {
        return Ok(true);
    }
    if !is_active {
        return Ok(false);
    }
    if is_public {
        return Ok(true);
    }
    Ok(TeamRepo::scope(pool, owner, id).await?.includes(principal))
}

/// Replace the team assignment when the request carried one.
pub(crate) async fn assign_teams(
    pool: &PgPool,
    owner: ScopeOwner,
    id: DbId,
    teams: Option<&[DbId]>,
) -> AppResult<()> {
    if let Some(team_ids) = teams {
        TeamRepo::set_assigned(pool, owner, id, team_ids).await?;
    }
    Ok(())
}

/// Reject answers that are not a JSON object. `null` counts as absent.
pub(crate) fn object_or_none(data: Option<Value>) -> Result<Option<Value>, CoreError> {
    match data {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(value)),
        Some(_) => Err(CoreError::Validation(MSG_DATA_NOT_OBJECT.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_or_none_accepts_objects_and_null() {
        assert_eq!(object_or_none(None).unwrap(), None);
        assert_eq!(object_or_none(Some(Value::Null)).unwrap(), None);
        assert_eq!(
            object_or_none(Some(json!({"a": 1}))).unwrap(),
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn object_or_none_rejects_scalars() {
        let err = object_or_none(Some(json!([1, 2]))).unwrap_err();
        assert_eq!(err.to_string(), MSG_DATA_NOT_OBJECT);
    }
}
