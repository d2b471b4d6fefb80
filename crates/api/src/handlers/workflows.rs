//! Handlers for workflow definitions and their n8n bindings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::lifecycle::LifecycleEvent;
use portal_core::types::{DbId, FormData};
use portal_db::context;
use portal_db::models::n8n_workflow::N8nBinding;
use portal_db::models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow};
use portal_db::repositories::{N8nWorkflowRepo, ProcessRepo, ScopeOwner, WorkflowRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{assign_teams, is_listed_for};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const MSG_FOREIGN_INITIALIZE_PROCESS: &str =
    "Startprozess muss ein ausführbarer Prozess dieses Workflows sein";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkflowRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub workflow: CreateWorkflow,
    /// Ids of the teams the workflow is assigned to.
    pub teams: Option<Vec<DbId>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkflowRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub workflow: UpdateWorkflow,
    pub teams: Option<Vec<DbId>>,
}

/// Workflow plus its event bindings.
#[derive(Debug, Serialize)]
pub struct WorkflowDetail {
    #[serde(flatten)]
    pub workflow: Workflow,
    pub n8n_bindings: Vec<N8nBinding>,
}

pub(crate) async fn find_workflow(state: &AppState, id: DbId) -> AppResult<Workflow> {
    Ok(WorkflowRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::WORKFLOW))?)
}

/// GET /api/v1/workflows
pub async fn list_workflows(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let mut visible = Vec::new();
    for workflow in WorkflowRepo::list(&state.pool).await? {
        let listed = is_listed_for(
            &state.pool,
            &user.principal,
            ScopeOwner::Workflow,
            workflow.id,
            workflow.is_active,
            workflow.is_public,
        )
        .await?;
        if listed {
            visible.push(workflow);
        }
    }

    Ok(Json(DataResponse { data: visible }))
}

/// POST /api/v1/workflows
pub async fn create_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflowRequest>,
) -> AppResult<impl IntoResponse> {
    access::require_role(&user.principal, Operation::CreateWorkflow)?;
    input.validate()?;

    let workflow = WorkflowRepo::create(&state.pool, &input.workflow).await?;
    assign_teams(&state.pool, ScopeOwner::Workflow, workflow.id, input.teams.as_deref()).await?;

    tracing::info!(
        workflow_id = workflow.id,
        name = %workflow.name,
        user_id = user.id(),
        "Workflow created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workflow = find_workflow(&state, workflow_id).await?;
    let listed = is_listed_for(
        &state.pool,
        &user.principal,
        ScopeOwner::Workflow,
        workflow.id,
        workflow.is_active,
        workflow.is_public,
    )
    .await?;
    if !listed {
        return Err(CoreError::PermissionDenied(
            Operation::ViewRun.denial_message().to_string(),
        )
        .into());
    }

    let n8n_bindings = N8nWorkflowRepo::bindings_for_workflow(&state.pool, workflow.id).await?;

    Ok(Json(DataResponse {
        data: WorkflowDetail {
            workflow,
            n8n_bindings,
        },
    }))
}

/// PUT /api/v1/workflows/{id}
///
/// Guarded by the workflow's own edit rule.
pub async fn update_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(input): Json<UpdateWorkflowRequest>,
) -> AppResult<impl IntoResponse> {
    let workflow = find_workflow(&state, workflow_id).await?;
    let ctx =
        context::workflow_context(&state.pool, &user.principal, workflow.id, FormData::new())
            .await?;
    access::authorize(
        &user.principal,
        Operation::EditWorkflow,
        Subject::Rule {
            rule: &workflow.edit_workflow_permissions,
            context: &ctx,
        },
    )?;
    input.validate()?;

    if let Some(process_id) = input.workflow.initialize_process_id {
        let process = ProcessRepo::find_by_id(&state.pool, process_id).await?;
        let belongs = process.is_some_and(|p| {
            p.workflow_id == workflow.id && p.deleted_at.is_none() && !p.is_category
        });
        if !belongs {
            return Err(CoreError::Validation(MSG_FOREIGN_INITIALIZE_PROCESS.into()).into());
        }
    }

    let updated = WorkflowRepo::update(&state.pool, workflow.id, &input.workflow)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::WORKFLOW))?;
    assign_teams(&state.pool, ScopeOwner::Workflow, updated.id, input.teams.as_deref()).await?;

    tracing::info!(workflow_id, user_id = user.id(), "Workflow updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/workflows/{id}
pub async fn delete_workflow(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::DeleteWorkflow)?;

    if !WorkflowRepo::delete(&state.pool, workflow_id).await? {
        return Err(CoreError::not_found(entity::WORKFLOW).into());
    }

    tracing::info!(workflow_id, user_id = user.id(), "Workflow deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/workflows/{id}/n8n/{n8n_id}/{event}
pub async fn connect_n8n(
    user: AuthUser,
    State(state): State<AppState>,
    Path((workflow_id, n8n_id, event)): Path<(DbId, DbId, String)>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageWorkflowBindings)?;
    let event: LifecycleEvent = event.parse()?;

    find_workflow(&state, workflow_id).await?;
    N8nWorkflowRepo::find_by_id(&state.pool, n8n_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::N8N_WORKFLOW))?;

    N8nWorkflowRepo::connect_workflow(&state.pool, workflow_id, n8n_id, event).await?;

    tracing::info!(workflow_id, n8n_id, %event, "N8n workflow connected");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/workflows/{id}/n8n/{n8n_id}/{event}
pub async fn disconnect_n8n(
    user: AuthUser,
    State(state): State<AppState>,
    Path((workflow_id, n8n_id, event)): Path<(DbId, DbId, String)>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::ManageWorkflowBindings)?;
    let event: LifecycleEvent = event.parse()?;

    if !N8nWorkflowRepo::disconnect_workflow(&state.pool, workflow_id, n8n_id, event).await? {
        return Err(CoreError::not_found(entity::N8N_WORKFLOW).into());
    }

    tracing::info!(workflow_id, n8n_id, %event, "N8n workflow disconnected");
    Ok(StatusCode::NO_CONTENT)
}
