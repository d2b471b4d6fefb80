//! Handlers for form submissions moving through their review cycle.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::Operation;
use portal_core::error::{entity, CoreError};
use portal_core::form_lifecycle::{self, SubmissionAction};
use portal_core::permissions::merge_data;
use portal_core::types::DbId;
use portal_db::models::form_submission::FormSubmission;
use portal_db::repositories::FormSubmissionRepo;
use serde::Deserialize;
use serde_json::Value;

use super::forms::{authorize_review, authorize_submit, find_form};
use super::object_or_none;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

const MSG_CONCURRENT_CHANGE: &str = "Formular Einreichung wurde zwischenzeitlich geändert";

#[derive(Debug, Deserialize)]
pub struct SaveSubmissionRequest {
    pub data: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitSubmissionRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveSubmissionRequest {
    /// `false` lifts the archive flag again.
    #[serde(default = "archive_default")]
    pub archived: bool,
}

fn archive_default() -> bool {
    true
}

async fn find_submission(state: &AppState, id: DbId) -> AppResult<FormSubmission> {
    Ok(FormSubmissionRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::FORM_SUBMISSION))?)
}

fn unknown_status(submission: &FormSubmission) -> CoreError {
    CoreError::Internal(format!(
        "form submission {} has unknown status id {}",
        submission.id, submission.status_id
    ))
}

/// Only the submitter (or an admin) edits their own submission.
fn ensure_owner(user: &AuthUser, submission: &FormSubmission) -> Result<(), CoreError> {
    if user.principal.role.is_admin() || submission.submitted_by_id == Some(user.id()) {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied(
            Operation::SubmitForm.denial_message().to_string(),
        ))
    }
}

async fn authorize_action(
    state: &AppState,
    user: &AuthUser,
    submission: &FormSubmission,
    action: SubmissionAction,
) -> AppResult<portal_db::models::form::Form> {
    let form = find_form(state, submission.form_id).await?;
    match action.operation() {
        Operation::ReviewForm => {
            authorize_review(state, user, &form, merge_data([&submission.data])).await?
        }
        _ => {
            ensure_owner(user, submission)?;
            authorize_submit(state, user, &form).await?;
        }
    }
    Ok(form)
}

async fn transition(
    state: &AppState,
    user: &AuthUser,
    submission_id: DbId,
    action: SubmissionAction,
    data: Option<Value>,
) -> AppResult<FormSubmission> {
    let submission = find_submission(state, submission_id).await?;
    let form = authorize_action(state, user, &submission, action).await?;
    let current = submission.state().ok_or_else(|| unknown_status(&submission))?;

    let change = form_lifecycle::plan_transition(current, action, form.is_active)?;
    let data = object_or_none(data)?;

    let updated = FormSubmissionRepo::transition(
        &state.pool,
        submission.id,
        change.from,
        change.to,
        data.as_ref(),
    )
    .await?
    .ok_or_else(|| CoreError::Conflict(MSG_CONCURRENT_CHANGE.into()))?;

    tracing::info!(
        submission_id,
        user_id = user.id(),
        from = %change.from,
        to = %change.to,
        "Form submission status changed",
    );

    Ok(updated)
}

/// GET /api/v1/form-submissions/{id}
///
/// Visible to its submitter and to reviewers.
pub async fn get_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let submission = find_submission(&state, submission_id).await?;
    if ensure_owner(&user, &submission).is_err() {
        let form = find_form(&state, submission.form_id).await?;
        authorize_review(&state, &user, &form, merge_data([&submission.data])).await?;
    }

    Ok(Json(DataResponse { data: submission }))
}

/// PUT /api/v1/form-submissions/{id}
pub async fn save_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
    Json(input): Json<SaveSubmissionRequest>,
) -> AppResult<impl IntoResponse> {
    let submission = transition(
        &state,
        &user,
        submission_id,
        SubmissionAction::Save,
        Some(input.data),
    )
    .await?;
    Ok(Json(DataResponse { data: submission }))
}

/// POST /api/v1/form-submissions/{id}/submit
pub async fn submit_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
    Json(input): Json<SubmitSubmissionRequest>,
) -> AppResult<impl IntoResponse> {
    let submission = transition(
        &state,
        &user,
        submission_id,
        SubmissionAction::Submit,
        input.data,
    )
    .await?;
    Ok(Json(DataResponse { data: submission }))
}

/// POST /api/v1/form-submissions/{id}/review
pub async fn start_review(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let submission = transition(
        &state,
        &user,
        submission_id,
        SubmissionAction::StartReview,
        None,
    )
    .await?;
    Ok(Json(DataResponse { data: submission }))
}

/// POST /api/v1/form-submissions/{id}/reject
pub async fn reject_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let submission =
        transition(&state, &user, submission_id, SubmissionAction::Reject, None).await?;
    Ok(Json(DataResponse { data: submission }))
}

/// POST /api/v1/form-submissions/{id}/approve
pub async fn approve_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let submission =
        transition(&state, &user, submission_id, SubmissionAction::Approve, None).await?;
    Ok(Json(DataResponse { data: submission }))
}

/// POST /api/v1/form-submissions/{id}/archive
///
/// Body `{"archived": false}` reverses an archive.
pub async fn archive_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(submission_id): Path<DbId>,
    Json(input): Json<ArchiveSubmissionRequest>,
) -> AppResult<impl IntoResponse> {
    let submission = find_submission(&state, submission_id).await?;
    let form = find_form(&state, submission.form_id).await?;
    authorize_review(&state, &user, &form, merge_data([&submission.data])).await?;

    let current = submission.state().ok_or_else(|| unknown_status(&submission))?;
    let archived = form_lifecycle::plan_archive(current, input.archived)?;

    let updated = FormSubmissionRepo::set_archived(&state.pool, submission.id, archived)
        .await?
        .ok_or_else(|| CoreError::Conflict(MSG_CONCURRENT_CHANGE.into()))?;

    tracing::info!(submission_id, archived, user_id = user.id(), "Form submission archive flag set");

    Ok(Json(DataResponse { data: updated }))
}
