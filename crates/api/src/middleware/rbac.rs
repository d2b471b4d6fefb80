//! Role-based access control (RBAC) extractors.
//!
//! Wraps [`AuthUser`] and rejects requests whose role does not meet the
//! minimum requirement. Operation-specific denials with their own messages
//! go through [`portal_core::access`] in the handlers instead.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use portal_core::error::CoreError;
use portal_core::roles::Role;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires `moderator` or `admin`. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn moderators_only(RequireModerator(user): RequireModerator) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireModerator(pub AuthUser);

impl FromRequestParts<AppState> for RequireModerator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.principal.role.meets(Role::Moderator) {
            return Err(AppError::Core(CoreError::PermissionDenied(
                "Keine Berechtigung für diesen Bereich".into(),
            )));
        }
        Ok(RequireModerator(user))
    }
}
