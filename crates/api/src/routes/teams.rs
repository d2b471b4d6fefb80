//! Route definitions for teams, mounted at `/teams`.

use axum::routing::{delete, get, put};
use axum::Router;

use crate::handlers::teams;
use crate::state::AppState;

/// ```text
/// GET    /                          -> list_teams
/// POST   /                          -> create_team
/// DELETE /{id}                      -> delete_team
/// GET    /{id}/members              -> list_members
/// PUT    /{id}/members/{user_id}    -> add_member
/// DELETE /{id}/members/{user_id}    -> remove_member
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(teams::list_teams).post(teams::create_team))
        .route("/{id}", delete(teams::delete_team))
        .route("/{id}/members", get(teams::list_members))
        .route(
            "/{id}/members/{user_id}",
            put(teams::add_member).delete(teams::remove_member),
        )
}
