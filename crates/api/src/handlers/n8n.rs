//! Handlers for the registry of external automation workflows.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation};
use portal_core::error::{entity, CoreError};
use portal_core::types::DbId;
use portal_db::models::n8n_workflow::CreateN8nWorkflow;
use portal_db::repositories::N8nWorkflowRepo;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireModerator;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/n8n-workflows
pub async fn list_n8n_workflows(
    RequireModerator(_user): RequireModerator,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let workflows = N8nWorkflowRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: workflows }))
}

/// POST /api/v1/n8n-workflows
pub async fn create_n8n_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateN8nWorkflow>,
) -> AppResult<impl IntoResponse> {
    access::require_role(&user.principal, Operation::ManageN8nWorkflows)?;
    input.validate()?;

    let workflow = N8nWorkflowRepo::create(&state.pool, &input).await?;

    tracing::info!(
        n8n_id = workflow.id,
        external_id = %workflow.workflow_id,
        user_id = user.id(),
        "N8n workflow registered",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// DELETE /api/v1/n8n-workflows/{id}
///
/// Removes every binding of the external workflow as well.
pub async fn delete_n8n_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(n8n_id): Path<DbId>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageN8nWorkflows)?;

    if !N8nWorkflowRepo::delete(&state.pool, n8n_id).await? {
        return Err(CoreError::not_found(entity::N8N_WORKFLOW).into());
    }

    tracing::info!(n8n_id, user_id = user.id(), "N8n workflow deleted");
    Ok(StatusCode::NO_CONTENT)
}
