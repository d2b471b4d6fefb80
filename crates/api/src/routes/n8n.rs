//! Route definitions for external automation workflows, mounted at `/n8n-workflows`.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::n8n;
use crate::state::AppState;

/// ```text
/// GET    /        -> list_n8n_workflows
/// POST   /        -> create_n8n_workflow
/// DELETE /{id}    -> delete_n8n_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(n8n::list_n8n_workflows).post(n8n::create_n8n_workflow),
        )
        .route("/{id}", delete(n8n::delete_n8n_workflow))
}
