//! Handlers for process runs: view, save, complete, reset.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::types::DbId;
use portal_db::context;
use portal_db::lifecycle;
use portal_db::models::process::Process;
use portal_db::models::process_run::ProcessRun;
use portal_db::models::workflow_run::WorkflowRun;
use portal_db::repositories::{ProcessRepo, ProcessRunRepo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::object_or_none;
use super::workflow_runs::{find_run, merged_run_data};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::notify;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveProcessRunRequest {
    pub data: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteProcessRunRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetProcessRunRequest {
    /// Shown to whoever has to redo the process.
    #[validate(length(min = 1, max = 2000))]
    pub reset_text: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessRunDetail {
    #[serde(flatten)]
    pub process_run: ProcessRun,
    pub status: Option<&'static str>,
    pub process: Process,
    pub workflow_run: WorkflowRun,
}

/// GET /api/v1/process-runs/{id}
///
/// Guarded by the process's view rule, evaluated with the run's merged data.
pub async fn get_process_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let process_run = ProcessRunRepo::find_by_id(&state.pool, process_run_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::PROCESS_RUN))?;
    let run = find_run(&state, process_run.workflow_run_id).await?;
    let process = ProcessRepo::find_by_id(&state.pool, process_run.process_id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::PROCESS))?;

    let processes = ProcessRepo::list_for_workflow(&state.pool, run.workflow_id).await?;
    let siblings = ProcessRunRepo::list_for_run(&state.pool, run.id).await?;
    let ctx = context::process_context(
        &state.pool,
        &user.principal,
        run.workflow_id,
        process.id,
        merged_run_data(&processes, &siblings),
    )
    .await?;
    access::authorize(
        &user.principal,
        Operation::ViewProcess,
        Subject::Rule {
            rule: &process.view_process_permissions,
            context: &ctx,
        },
    )?;

    let status = process_run.status().map(|s| s.as_str());
    Ok(Json(DataResponse {
        data: ProcessRunDetail {
            process_run,
            status,
            process,
            workflow_run: run,
        },
    }))
}

/// PUT /api/v1/process-runs/{id}
pub async fn save_process_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_run_id): Path<DbId>,
    Json(input): Json<SaveProcessRunRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = lifecycle::save(&state.pool, &user.principal, process_run_id, input.data).await?;

    tracing::info!(process_run_id, user_id = user.id(), "Process run saved");

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok(Json(DataResponse { data: outcome.value }))
}

/// POST /api/v1/process-runs/{id}/complete
pub async fn complete_process_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_run_id): Path<DbId>,
    Json(input): Json<CompleteProcessRunRequest>,
) -> AppResult<impl IntoResponse> {
    let data = object_or_none(input.data)?;
    let outcome = lifecycle::complete(&state.pool, &user.principal, process_run_id, data).await?;

    tracing::info!(
        process_run_id,
        user_id = user.id(),
        step = ?outcome.dispatch.step,
        "Process run completed",
    );

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok(Json(DataResponse { data: outcome.value }))
}

/// POST /api/v1/process-runs/{id}/reset
pub async fn reset_process_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(process_run_id): Path<DbId>,
    Json(input): Json<ResetProcessRunRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let outcome =
        lifecycle::reset(&state.pool, &user.principal, process_run_id, input.reset_text).await?;

    tracing::info!(process_run_id, user_id = user.id(), "Process run reset");

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok(Json(DataResponse { data: outcome.value }))
}
