//! Route definitions for workflow definitions, mounted at `/workflows`.

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::{processes, workflow_runs, workflows};
use crate::state::AppState;

/// ```text
/// GET    /                                -> list_workflows
/// POST   /                                -> create_workflow
/// GET    /{id}                            -> get_workflow
/// PUT    /{id}                            -> update_workflow
/// DELETE /{id}                            -> delete_workflow
/// PUT    /{id}/n8n/{n8n_id}/{event}       -> connect_n8n
/// DELETE /{id}/n8n/{n8n_id}/{event}       -> disconnect_n8n
/// GET    /{id}/processes                  -> list_processes
/// POST   /{id}/processes                  -> create_process
/// GET    /{id}/runs                       -> list_runs
/// POST   /{id}/runs                       -> initialize_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(workflows::list_workflows).post(workflows::create_workflow),
        )
        .route(
            "/{id}",
            get(workflows::get_workflow)
                .put(workflows::update_workflow)
                .delete(workflows::delete_workflow),
        )
        .route(
            "/{id}/n8n/{n8n_id}/{event}",
            put(workflows::connect_n8n).delete(workflows::disconnect_n8n),
        )
        .route(
            "/{id}/processes",
            get(processes::list_processes).post(processes::create_process),
        )
        .route(
            "/{id}/runs",
            get(workflow_runs::list_runs).post(workflow_runs::initialize_run),
        )
}
