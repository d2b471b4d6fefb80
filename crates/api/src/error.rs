use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portal_core::error::CoreError;
use portal_db::lifecycle::LifecycleError;
use portal_events::DispatchError;
use serde_json::json;

/// Generic message for anything a client must not see details of.
const MSG_INTERNAL: &str = "Ein interner Fehler ist aufgetreten";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error": message, "code": CODE }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `portal_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Webhook notification failed after the state change was stored.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Core(core) => AppError::Core(core),
            LifecycleError::Database(db) => AppError::Database(db),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(err.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Dispatch(DispatchError::Configuration(msg)) => {
                classify_core_error(&CoreError::Configuration(msg.clone()))
            }
            AppError::Dispatch(err @ DispatchError::Failed(_)) => {
                tracing::warn!(error = %err, "Webhook dispatch failed");
                (StatusCode::BAD_GATEWAY, "WEBHOOK_FAILED", err.to_string())
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        CoreError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        CoreError::Precondition(_) => (StatusCode::CONFLICT, "PRECONDITION_FAILED"),
        CoreError::DependencyUnsatisfied(_) => (StatusCode::CONFLICT, "DEPENDENCY_UNSATISFIED"),
        CoreError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        CoreError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        CoreError::Configuration(msg) => {
            tracing::error!(error = %msg, "Configuration error");
            (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    (status, code, err.to_string())
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations (23505) and foreign key violations (23503) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Eintrag nicht gefunden".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Ein Eintrag mit diesen Werten existiert bereits".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            "Verknüpfter Eintrag fehlt oder wird noch verwendet".to_string(),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                MSG_INTERNAL.to_string(),
            )
        }
    }
}
