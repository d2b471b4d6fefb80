//! Route definitions for workflow runs and process runs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{process_runs, workflow_runs};
use crate::state::AppState;

/// ```text
/// GET    /workflow-runs/{id}              -> get_run
/// DELETE /workflow-runs/{id}              -> delete_run
/// POST   /workflow-runs/{id}/archive      -> archive_run
/// POST   /workflow-runs/{id}/reactivate   -> reactivate_run
/// GET    /process-runs/{id}               -> get_process_run
/// PUT    /process-runs/{id}               -> save_process_run
/// POST   /process-runs/{id}/complete      -> complete_process_run
/// POST   /process-runs/{id}/reset         -> reset_process_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/workflow-runs/{id}",
            get(workflow_runs::get_run).delete(workflow_runs::delete_run),
        )
        .route("/workflow-runs/{id}/archive", post(workflow_runs::archive_run))
        .route(
            "/workflow-runs/{id}/reactivate",
            post(workflow_runs::reactivate_run),
        )
        .route(
            "/process-runs/{id}",
            get(process_runs::get_process_run).put(process_runs::save_process_run),
        )
        .route(
            "/process-runs/{id}/complete",
            post(process_runs::complete_process_run),
        )
        .route("/process-runs/{id}/reset", post(process_runs::reset_process_run))
}
