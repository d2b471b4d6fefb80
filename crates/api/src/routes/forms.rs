//! Route definitions for forms and form submissions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{forms, submissions};
use crate::state::AppState;

/// ```text
/// GET    /forms                           -> list_forms
/// POST   /forms                           -> create_form
/// GET    /forms/{id}                      -> get_form
/// PUT    /forms/{id}                      -> update_form
/// DELETE /forms/{id}                      -> delete_form
/// GET    /forms/{id}/submissions          -> list_submissions
/// POST   /forms/{id}/submissions          -> start_submission
/// GET    /form-submissions/{id}           -> get_submission
/// PUT    /form-submissions/{id}           -> save_submission
/// POST   /form-submissions/{id}/submit    -> submit_submission
/// POST   /form-submissions/{id}/review    -> start_review
/// POST   /form-submissions/{id}/reject    -> reject_submission
/// POST   /form-submissions/{id}/approve   -> approve_submission
/// POST   /form-submissions/{id}/archive   -> archive_submission
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forms", get(forms::list_forms).post(forms::create_form))
        .route(
            "/forms/{id}",
            get(forms::get_form)
                .put(forms::update_form)
                .delete(forms::delete_form),
        )
        .route(
            "/forms/{id}/submissions",
            get(forms::list_submissions).post(forms::start_submission),
        )
        .route(
            "/form-submissions/{id}",
            get(submissions::get_submission).put(submissions::save_submission),
        )
        .route(
            "/form-submissions/{id}/submit",
            post(submissions::submit_submission),
        )
        .route("/form-submissions/{id}/review", post(submissions::start_review))
        .route(
            "/form-submissions/{id}/reject",
            post(submissions::reject_submission),
        )
        .route(
            "/form-submissions/{id}/approve",
            post(submissions::approve_submission),
        )
        .route(
            "/form-submissions/{id}/archive",
            post(submissions::archive_submission),
        )
}
