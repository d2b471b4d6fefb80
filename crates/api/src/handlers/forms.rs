//! Handlers for standalone forms and for starting submissions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use portal_core::access::{self, Operation, Subject};
use portal_core::error::{entity, CoreError};
use portal_core::form_lifecycle;
use portal_core::types::{DbId, FormData};
use portal_db::context;
use portal_db::models::form::{CreateForm, Form, UpdateForm};
use portal_db::repositories::{FormRepo, FormSubmissionRepo, ScopeOwner, TeamRepo};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::{assign_teams, is_listed_for, object_or_none};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFormRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub form: CreateForm,
    pub teams: Option<Vec<DbId>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFormRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub form: UpdateForm,
    pub teams: Option<Vec<DbId>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartSubmissionRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

pub(crate) async fn find_form(state: &AppState, id: DbId) -> AppResult<Form> {
    Ok(FormRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::FORM))?)
}

/// Evaluate the form's review rule for the caller.
pub(crate) async fn authorize_review(
    state: &AppState,
    user: &AuthUser,
    form: &Form,
    data: FormData,
) -> AppResult<()> {
    let ctx = context::form_context(&state.pool, &user.principal, form.id, data).await?;
    access::authorize(
        &user.principal,
        Operation::ReviewForm,
        Subject::Rule {
            rule: &form.review_form_permissions,
            context: &ctx,
        },
    )?;
    Ok(())
}

/// Public forms are open to everyone; others need team membership.
pub(crate) async fn authorize_submit(state: &AppState, user: &AuthUser, form: &Form) -> AppResult<()> {
    let scope = TeamRepo::scope(&state.pool, ScopeOwner::Form, form.id).await?;
    access::authorize(
        &user.principal,
        Operation::SubmitForm,
        Subject::Scope {
            is_public: form.is_public,
            scope: &scope,
        },
    )?;
    Ok(())
}

/// GET /api/v1/forms
pub async fn list_forms(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let mut visible = Vec::new();
    for form in FormRepo::list(&state.pool).await? {
        let listed = is_listed_for(
            &state.pool,
            &user.principal,
            ScopeOwner::Form,
            form.id,
            form.is_active,
            form.is_public,
        )
        .await?;
        if listed {
            visible.push(form);
        }
    }

    Ok(Json(DataResponse { data: visible }))
}

/// POST /api/v1/forms
pub async fn create_form(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateFormRequest>,
) -> AppResult<impl IntoResponse> {
    access::require_role(&user.principal, Operation::CreateForm)?;
    input.validate()?;

    let form = FormRepo::create(&state.pool, &input.form).await?;
    assign_teams(&state.pool, ScopeOwner::Form, form.id, input.teams.as_deref()).await?;

    tracing::info!(form_id = form.id, title = %form.title, user_id = user.id(), "Form created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: form })))
}

/// GET /api/v1/forms/{id}
pub async fn get_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(form_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let form = find_form(&state, form_id).await?;
    let listed = is_listed_for(
        &state.pool,
        &user.principal,
        ScopeOwner::Form,
        form.id,
        form.is_active,
        form.is_public,
    )
    .await?;
    if !listed {
        return Err(CoreError::PermissionDenied(
            Operation::SubmitForm.denial_message().to_string(),
        )
        .into());
    }

    Ok(Json(DataResponse { data: form }))
}

/// PUT /api/v1/forms/{id}
pub async fn update_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(form_id): Path<DbId>,
    Json(input): Json<UpdateFormRequest>,
) -> AppResult<impl IntoResponse> {
    let form = find_form(&state, form_id).await?;
    let ctx = context::form_context(&state.pool, &user.principal, form.id, FormData::new()).await?;
    access::authorize(
        &user.principal,
        Operation::EditForm,
        Subject::Rule {
            rule: &form.edit_form_permissions,
            context: &ctx,
        },
    )?;
    input.validate()?;

    let updated = FormRepo::update(&state.pool, form.id, &input.form)
        .await?
        .ok_or_else(|| CoreError::not_found(entity::FORM))?;
    assign_teams(&state.pool, ScopeOwner::Form, updated.id, input.teams.as_deref()).await?;

    tracing::info!(form_id, user_id = user.id(), "Form updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/forms/{id}
pub async fn delete_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(form_id): Path<DbId>,
) -> AppResult<StatusCode> {
    access::require_role(&user.principal, Operation::DeleteForm)?;

    if !FormRepo::delete(&state.pool, form_id).await? {
        return Err(CoreError::not_found(entity::FORM).into());
    }

    tracing::info!(form_id, user_id = user.id(), "Form deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/forms/{id}/submissions
///
/// Reviewer view; guarded by the form's review rule.
pub async fn list_submissions(
    user: AuthUser,
    State(state): State<AppState>,
    Path(form_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let form = find_form(&state, form_id).await?;
    authorize_review(&state, &user, &form, FormData::new()).await?;

    let submissions = FormSubmissionRepo::list_for_form(&state.pool, form.id).await?;
    Ok(Json(DataResponse { data: submissions }))
}

/// POST /api/v1/forms/{id}/submissions
pub async fn start_submission(
    user: AuthUser,
    State(state): State<AppState>,
    Path(form_id): Path<DbId>,
    Json(input): Json<StartSubmissionRequest>,
) -> AppResult<impl IntoResponse> {
    let form = find_form(&state, form_id).await?;
    authorize_submit(&state, &user, &form).await?;
    form_lifecycle::plan_start(form.is_active)?;
    let data = object_or_none(input.data)?;

    let submission =
        FormSubmissionRepo::create(&state.pool, form.id, user.id(), data.as_ref()).await?;

    tracing::info!(
        submission_id = submission.id,
        form_id,
        user_id = user.id(),
        "Form submission started",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: submission })))
}
