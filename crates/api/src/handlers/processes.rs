//! Handlers for process definitions inside a workflow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::lifecycle::LifecycleEvent;
use portal_core::process_tree::{
    creates_dependency_cycle, creates_parent_cycle, ProcessTree,
};
use portal_core::types::{DbId, FormData};
use portal_db::context;
use portal_db::models::n8n_workflow::N8nBinding;
use portal_db::models::process::{CreateProcess, Process, UpdateProcess};
use portal_db::repositories::{N8nWorkflowRepo, ProcessRepo, ScopeOwner};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{assign_teams, is_listed_for};
use super::workflows::find_workflow;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const MSG_FOREIGN_PARENT: &str = "Übergeordneter Prozess gehört nicht zu diesem Workflow";
const MSG_PARENT_CYCLE: &str = "Übergeordneter Prozess würde einen Zyklus bilden";
const MSG_DEPENDENCY_CYCLE: &str = "Abhängigkeiten würden einen Zyklus bilden";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProcessRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub process: CreateProcess,
    /// Ids of processes of the same workflow that must complete first.
    pub dependencies: Option<Vec<DbId>>,
    pub teams: Option<Vec<DbId>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProcessRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub process: UpdateProcess,
    pub dependencies: Option<Vec<DbId>>,
    pub teams: Option<Vec<DbId>>,
}

#[derive(Debug, Serialize)]
pub struct ProcessDetail {
    #[serde(flatten)]
    pub process: Process,
    pub dependencies: Vec<DbId>,
    pub n8n_bindings: Vec<N8nBinding>,
}

async fn find_live_process(state: &AppState, id: DbId) -> AppResult<Process> {
    Ok(ProcessRepo::find_by_id(&state.pool, id)
        .await?
        .filter(|p| p.deleted_at.is_none())
        .ok_or_else(|| CoreError::not_found(entity::PROCESS))?)
}

/// Parents must be live processes of the same workflow.
async fn check_parent(state: &AppState, workflow_id: DbId, parent_id: Option<DbId>) -> AppResult<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    let parent = ProcessRepo::find_by_id(&state.pool, parent_id).await?;
    if !parent.is_some_and(|p| p.workflow_id == workflow_id && p.deleted_at.is_none()) {
        return Err(CoreError::Validation(MSG_FOREIGN_PARENT.into()).into());
    }
    Ok(())
}

/// Reject parent and dependency edits that would make the process reach
/// itself.
async fn check_cycles(
    state: &AppState,
    process: &Process,
    parent_id: Option<DbId>,
    depends_on: Option<&[DbId]>,
) -> AppResult<()> {
    if let Some(parent_id) = parent_id {
        let processes = ProcessRepo::list_for_workflow(&state.pool, process.workflow_id).await?;
        if creates_parent_cycle(&processes, process.id, parent_id) {
            return Err(CoreError::Validation(MSG_PARENT_CYCLE.into()).into());
        }
    }
    if let Some(depends_on) = depends_on {
        let edges = ProcessRepo::dependency_edges(&state.pool, process.workflow_id).await?;
        if creates_dependency_cycle(&edges, process.id, depends_on) {
            return Err(CoreError::Validation(MSG_DEPENDENCY_CYCLE.into()).into());
        }
    }
    Ok(())
}

/// Authorize against the process's edit rule.
async fn authorize_edit(state: &AppState, user: &AuthUser, process: &Process) -> AppResult<()> {
    let ctx = context::process_context(
        &state.pool,
        &user.principal,
        process.workflow_id,
        process.id,
        FormData::new(),
    )
    .await?;
    access::authorize(
        &user.principal,
        Operation::EditProcess,
        Subject::Rule {
            rule: &process.edit_process_permissions,
            context: &ctx,
        },
    )?;
    Ok(())
}

async fn detail(state: &AppState, process: Process) -> AppResult<ProcessDetail> {
    let dependencies = ProcessRepo::dependency_ids(&state.pool, process.id).await?;
    let n8n_bindings = N8nWorkflowRepo::bindings_for_process(&state.pool, process.id).await?;
    Ok(ProcessDetail {
        process,
        dependencies,
        n8n_bindings,
    })
}

/// GET /api/v1/workflows/{id}/processes
///
/// Live processes as a nested tree; siblings in display order.
pub async fn list_processes(
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

    let processes = ProcessRepo::list_for_workflow(&state.pool, workflow.id).await?;
    let tree = ProcessTree::build(processes).into_nested();

    Ok(Json(DataResponse { data: tree }))
}

/// POST /api/v1/workflows/{id}/processes
pub async fn create_process(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(input): Json<CreateProcessRequest>,
) -> AppResult<impl IntoResponse> {
    access::require_role(&user.principal, Operation::CreateProcess)?;
    input.validate()?;
    let workflow = find_workflow(&state, workflow_id).await?;
    check_parent(&state, workflow.id, input.process.parent_id).await?;

    let process = ProcessRepo::create(&state.pool, workflow.id, &input.process).await?;
    if let Some(depends_on) = &input.dependencies {
        ProcessRepo::set_dependencies(&state.pool, process.id, depends_on).await?;
    }
    assign_teams(&state.pool, ScopeOwner::Process, process.id, input.teams.as_deref()).await?;

    tracing::info!(
        process_id = process.id,
        workflow_id,
        user_id = user.id(),
        "Process created",
    );

    let body = detail(&state, process).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: body })))
}

/// PUT /api/v1/processes/{id}
pub async fn update_process(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_id): Path<DbId>,
    Json(input): Json<UpdateProcessRequest>,
) -> AppResult<impl IntoResponse> {
    let process = find_live_process(&state, process_id).await?;
    authorize_edit(&state, &user, &process).await?;
    input.validate()?;
    check_parent(&state, process.workflow_id, input.process.parent_id).await?;
    check_cycles(
        &state,
        &process,
        input.process.parent_id,
        input.dependencies.as_deref(),
    )
    .await?;

    let updated = ProcessRepo::update(&state.pool, process.id, &input.process)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::PROCESS))?;
    if let Some(depends_on) = &input.dependencies {
        ProcessRepo::set_dependencies(&state.pool, updated.id, depends_on).await?;
    }
    assign_teams(&state.pool, ScopeOwner::Process, updated.id, input.teams.as_deref()).await?;

    tracing::info!(process_id, user_id = user.id(), "Process updated");

    let body = detail(&state, updated).await?;
    Ok(Json(DataResponse { data: body }))
}

/// DELETE /api/v1/processes/{id}
///
/// Soft delete; existing process runs keep their data but drop out of
/// lifecycle checks.
pub async fn delete_process(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_id): Path<DbId>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::DeleteProcess)?;

    if !ProcessRepo::soft_delete(&state.pool, process_id).await? {
        return Err(CoreError::not_found(entity::PROCESS).into());
    }

    tracing::info!(process_id, user_id = user.id(), "Process deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn process_event(raw: &str) -> AppResult<LifecycleEvent> {
    let event: LifecycleEvent = raw.parse()?;
    if !event.allowed_on_process() {
        return Err(CoreError::Validation(format!(
            "Ereignis '{event}' ist für Prozesse nicht verfügbar"
        ))
        .into());
    }
    Ok(event)
}

/// PUT /api/v1/processes/{id}/n8n/{n8n_id}/{event}
pub async fn connect_n8n(
    user: AuthUser,
    State(state): State<AppState>,
    Path((process_id, n8n_id, event)): Path<(DbId, DbId, String)>,
) -> AppResult<StatusCode> {
    let process = find_live_process(&state, process_id).await?;
    authorize_edit(&state, &user, &process).await?;
    let event = process_event(&event)?;

    N8nWorkflowRepo::find_by_id(&state.pool, n8n_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::N8N_WORKFLOW))?;
    N8nWorkflowRepo::connect_process(&state.pool, process.id, n8n_id, event).await?;

    tracing::info!(process_id, n8n_id, %event, "N8n workflow connected to process");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/processes/{id}/n8n/{n8n_id}/{event}
pub async fn disconnect_n8n(
    user: AuthUser,
    State(state): State<AppState>,
    Path((process_id, n8n_id, event)): Path<(DbId, DbId, String)>,
) -> AppResult<StatusCode> {
    let process = find_live_process(&state, process_id).await?;
    authorize_edit(&state, &user, &process).await?;
    let event = process_event(&event)?;

    if !N8nWorkflowRepo::disconnect_process(&state.pool, process.id, n8n_id, event).await? {
        return Err(CoreError::not_found(entity::N8N_WORKFLOW).into());
    }

    tracing::info!(process_id, n8n_id, %event, "N8n workflow disconnected from process");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use assert_matches::assert_matches;

    #[test]
    fn process_events_are_limited() {
        assert_eq!(process_event("complete").unwrap(), LifecycleEvent::Complete);
        assert_matches!(
            process_event("initialize"),
            Err(AppError::Core(CoreError::Validation(msg))) if msg.contains("initialize")
        );
        assert_matches!(process_event("unbekannt"), Err(AppError::Core(CoreError::Validation(_))));
    }
}
