//! Handlers for workflow runs: initialize, inspect, archive, reactivate, delete.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::permissions::merge_data;
use portal_core::process_tree::{ProcessTree, TreeItem, TreeNode};
use portal_core::summary::{parse_information, summarize, SummaryEntry};
use portal_core::types::{DbId, FormData};
use portal_db::context;
use portal_db::lifecycle;
use portal_db::models::process::Process;
use portal_db::models::process_run::ProcessRun;
use portal_db::models::workflow::Workflow;
use portal_db::models::workflow_run::WorkflowRun;
use portal_db::repositories::{ProcessRepo, ProcessRunRepo, WorkflowRunRepo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::object_or_none;
use super::workflows::find_workflow;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::notify;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InitializeRunRequest {
    /// Answers for the workflow's initializing process.
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ArchiveRunRequest {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRunsParams {
    #[serde(default)]
    pub include_archived: bool,
}

/// One process of the run tree with its run, if the process has one.
#[derive(Debug, Serialize)]
pub struct RunProcessNode {
    pub process_id: DbId,
    pub name: String,
    pub is_category: bool,
    pub parent_id: Option<DbId>,
    pub sort_order: i32,
    pub status: Option<&'static str>,
    pub process_run: Option<ProcessRun>,
}

impl TreeItem for RunProcessNode {
    fn id(&self) -> DbId {
        self.process_id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }

    fn order(&self) -> i32 {
        self.sort_order
    }
}

#[derive(Debug, Serialize)]
pub struct WorkflowRunDetail {
    #[serde(flatten)]
    pub run: WorkflowRun,
    pub status: Option<&'static str>,
    pub workflow_name: String,
    pub summary: Vec<SummaryEntry>,
    pub processes: Vec<TreeNode<RunProcessNode>>,
}

pub(crate) async fn find_run(state: &AppState, id: DbId) -> AppResult<WorkflowRun> {
    Ok(WorkflowRunRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::WORKFLOW_RUN))?)
}

/// Shallow merge of the run's answers in process display order.
pub(crate) fn merged_run_data(processes: &[Process], runs: &[ProcessRun]) -> FormData {
    merge_data(processes.iter().filter_map(|process| {
        runs.iter()
            .find(|run| run.process_id == process.id)
            .map(|run| &run.data)
    }))
}

/// Rule check against the workflow's submit rule, which also guards reading
/// and managing its runs.
async fn authorize_run_access(
    state: &AppState,
    user: &AuthUser,
    workflow: &Workflow,
    operation: Operation,
    data: FormData,
) -> AppResult<()> {
    let ctx = context::workflow_context(&state.pool, &user.principal, workflow.id, data).await?;
    access::authorize(
        &user.principal,
        operation,
        Subject::Rule {
            rule: &workflow.submit_process_permissions,
            context: &ctx,
        },
    )?;
    Ok(())
}

fn run_tree(processes: Vec<Process>, mut runs: Vec<ProcessRun>) -> Vec<TreeNode<RunProcessNode>> {
    let nodes = processes
        .into_iter()
        .map(|process| {
            let process_run = runs
                .iter()
                .position(|run| run.process_id == process.id)
                .map(|i| runs.swap_remove(i));
            RunProcessNode {
                process_id: process.id,
                name: process.name,
                is_category: process.is_category,
                parent_id: process.parent_id,
                sort_order: process.sort_order,
                status: process_run
                    .as_ref()
                    .and_then(ProcessRun::status)
                    .map(|s| s.as_str()),
                process_run,
            }
        })
        .collect();
    ProcessTree::build(nodes).into_nested()
}

/// POST /api/v1/workflows/{id}/runs
pub async fn initialize_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(input): Json<InitializeRunRequest>,
) -> AppResult<impl IntoResponse> {
    let seed = object_or_none(input.data)?;
    let outcome = lifecycle::initialize(&state.pool, &user.principal, workflow_id, seed).await?;

    tracing::info!(
        workflow_run_id = outcome.value.id,
        workflow_id,
        user_id = user.id(),
        "Workflow run initialized",
    );

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome.value })))
}

/// GET /api/v1/workflows/{id}/runs?include_archived=true
pub async fn list_runs(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Query(params): Query<ListRunsParams>,
) -> AppResult<impl IntoResponse> {
    let workflow = find_workflow(&state, workflow_id).await?;
    authorize_run_access(&state, &user, &workflow, Operation::ViewRun, FormData::new()).await?;

    let runs =
        WorkflowRunRepo::list_for_workflow(&state.pool, workflow.id, params.include_archived)
            .await?;

    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/workflow-runs/{id}
///
/// Run with its configured summary and the process tree annotated with
/// process run states.
pub async fn get_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = find_run(&state, run_id).await?;
    let workflow = find_workflow(&state, run.workflow_id).await?;
    let processes = ProcessRepo::list_for_workflow(&state.pool, workflow.id).await?;
    let process_runs = ProcessRunRepo::list_for_run(&state.pool, run.id).await?;

    let data = merged_run_data(&processes, &process_runs);
    authorize_run_access(&state, &user, &workflow, Operation::ViewRun, data.clone()).await?;

    let summary = summarize(&parse_information(&workflow.information), &data);
    let status = run.status().map(|s| s.as_str());

    Ok(Json(DataResponse {
        data: WorkflowRunDetail {
            run,
            status,
            workflow_name: workflow.name,
            summary,
            processes: run_tree(processes, process_runs),
        },
    }))
}

/// DELETE /api/v1/workflow-runs/{id}
pub async fn delete_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<StatusCode> {
    lifecycle::delete(&state.pool, &user.principal, run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/workflow-runs/{id}/archive
pub async fn archive_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(input): Json<ArchiveRunRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let outcome = lifecycle::archive(&state.pool, &user.principal, run_id, input.notes).await?;

    tracing::info!(workflow_run_id = run_id, user_id = user.id(), "Workflow run archived");

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok(Json(DataResponse { data: outcome.value }))
}

/// POST /api/v1/workflow-runs/{id}/reactivate
pub async fn reactivate_run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = lifecycle::reactivate(&state.pool, &user.principal, run_id).await?;

    tracing::info!(workflow_run_id = run_id, user_id = user.id(), "Workflow run reactivated");

    notify::deliver(state.notifier.as_ref(), &outcome.dispatch).await?;
    Ok(Json(DataResponse { data: outcome.value }))
}
