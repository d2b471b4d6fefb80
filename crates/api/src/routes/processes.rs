//! Route definitions for single processes, mounted at `/processes`.

use axum::routing::put;
use axum::Router;

use crate::handlers::processes;
use crate::state::AppState;

/// ```text
/// PUT    /{id}                            -> update_process
/// DELETE /{id}                            -> delete_process
/// PUT    /{id}/n8n/{n8n_id}/{event}       -> connect_n8n
/// DELETE /{id}/n8n/{n8n_id}/{event}       -> disconnect_n8n
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            put(processes::update_process).delete(processes::delete_process),
        )
        .route(
            "/{id}/n8n/{n8n_id}/{event}",
            put(processes::connect_n8n).delete(processes::disconnect_n8n),
        )
}
