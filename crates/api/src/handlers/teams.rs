//! Handlers for teams and team membership.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation};
use portal_core::error::{entity, CoreError};
use portal_core::types::DbId;
use portal_db::models::team::CreateTeam;
use portal_db::repositories::{TeamRepo, UserRepo};
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireModerator;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/teams
pub async fn list_teams(
    RequireModerator(_user): RequireModerator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let teams = TeamRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: teams }))
}

/// POST /api/v1/teams
pub async fn create_team(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateTeam>,
) -> AppResult<impl IntoResponse> {
    access::require_role(&user.principal, Operation::ManageTeams)?;
    input.validate()?;

    let team = TeamRepo::create(&state.pool, &input).await?;

    tracing::info!(team_id = team.id, name = %team.name, user_id = user.id(), "Team created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: team })))
}

/// DELETE /api/v1/teams/{id}
pub async fn delete_team(
    user: AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<DbId>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageTeams)?;

    if !TeamRepo::delete(&state.pool, team_id).await? {
        return Err(CoreError::not_found(entity::TEAM).into());
    }

    tracing::info!(team_id, user_id = user.id(), "Team deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/teams/{id}/members
pub async fn list_members(
    RequireModerator(_user): RequireModerator,
    State(state): State<AppState>,
    Path(team_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    TeamRepo::find_by_id(&state.pool, team_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::TEAM))?;

    let members = TeamRepo::list_members(&state.pool, team_id).await?;
    Ok(Json(DataResponse { data: members }))
}

/// PUT /api/v1/teams/{id}/members/{user_id}
pub async fn add_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((team_id, member_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageTeams)?;

    TeamRepo::find_by_id(&state.pool, team_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::TEAM))?;
    UserRepo::find_by_id(&state.pool, member_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::USER))?;

    TeamRepo::add_member(&state.pool, team_id, member_id).await?;

    tracing::info!(team_id, member_id, user_id = user.id(), "Team member added");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/teams/{id}/members/{user_id}
pub async fn remove_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path((team_id, member_id)): Path<(DbId, DbId)>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageTeams)?;

    if !TeamRepo::remove_member(&state.pool, team_id, member_id).await? {
        return Err(CoreError::not_found(entity::USER).into());
    }

    tracing::info!(team_id, member_id, user_id = user.id(), "Team member removed");
    Ok(StatusCode::NO_CONTENT)
}
