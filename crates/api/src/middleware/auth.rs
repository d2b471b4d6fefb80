//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use portal_core::error::CoreError;
use portal_core::permissions::Principal;
use portal_core::roles::Role;
use portal_db::repositories::TeamRepo;

use crate::auth::jwt::{validate_token, Claims};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller extracted from a JWT Bearer token in the
/// `Authorization` header.
///
/// Identity and role come from the token; team memberships are loaded from
/// the database on every request so rule evaluation sees current teams.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.principal.id, role = %user.principal.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
}

impl AuthUser {
    pub fn id(&self) -> portal_core::types::DbId {
        self.principal.id
    }
}

/// Pull the bearer token out of the request headers.
pub fn bearer_token(parts: &Parts) -> Result<&str, CoreError> {
    let header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| CoreError::Unauthorized("Nicht angemeldet".into()))?;

    header.strip_prefix("Bearer ").ok_or_else(|| {
        CoreError::Unauthorized("Ungültiger Authorization-Header, erwartet: Bearer <token>".into())
    })
}

/// Role and identity from validated claims, without teams.
pub fn principal_from_claims(claims: Claims) -> Result<Principal, CoreError> {
    let role: Role = claims
        .role
        .parse()
        .map_err(|_| CoreError::Unauthorized("Ungültige Rolle im Token".into()))?;
    Ok(Principal {
        id: claims.sub,
        email: claims.email,
        name: claims.name,
        role,
        teams: Vec::new(),
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            CoreError::Unauthorized("Ungültiges oder abgelaufenes Token".into())
        })?;

        let mut principal = principal_from_claims(claims)?;
        principal.teams = TeamRepo::names_for_user(&state.pool, principal.id).await?;

        Ok(AuthUser { principal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn claims(role: &str) -> Claims {
        Claims {
            sub: 5,
            email: "max@example.de".into(),
            name: "Max".into(),
            role: role.into(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn missing_header_is_unauthorized() {
        assert_matches!(bearer_token(&parts_with(None)), Err(CoreError::Unauthorized(_)));
    }

    #[test]
    fn non_bearer_scheme_is_unauthorized() {
        assert_matches!(
            bearer_token(&parts_with(Some("Basic Zm9vOmJhcg=="))),
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))).unwrap(), "abc.def");
    }

    #[test]
    fn claims_become_principal() {
        let principal = principal_from_claims(claims("moderator")).unwrap();
        assert_eq!(principal.id, 5);
        assert_eq!(principal.role, Role::Moderator);
        assert!(principal.teams.is_empty());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert_matches!(
            principal_from_claims(claims("superuser")),
            Err(CoreError::Unauthorized(_))
        );
    }
}
