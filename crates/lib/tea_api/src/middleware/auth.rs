//! Authentication middleware: Bearer token extraction, JWT verification and
//! the administrator gate.

use std::convert::Infallible;

use axum::Router;
use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::{Next, from_fn, from_fn_with_state};
use axum::response::Response;
use tea_core::auth::session::check_access_token;
use tea_core::models::auth::{AccessTokenClaims, Role};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Verified access-token claims, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessTokenClaims);

/// Axum middleware: attaches `AuthenticatedUser` when a Bearer token is sent.
///
/// Requests without an `Authorization` header, or with an empty one, pass
/// through anonymously; a non-empty header that is invalid is still rejected.
pub async fn optional_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, request, next, false).await
}

/// Axum middleware: requires `Authorization: Bearer <token>` and attaches
/// `AuthenticatedUser` to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, request, next, true).await
}

/// Gate every route of `router` behind a required login and the admin role.
pub fn admin_only(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // The last layer added runs first.
    router
        .layer(from_fn(require_admin))
        .layer(from_fn_with_state(state, require_auth))
}

async fn authenticate(
    state: &AppState,
    mut request: Request,
    next: Next,
    required: bool,
) -> Result<Response, AppError> {
    // An empty header value carries no credential and counts as absent.
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .filter(|h| !h.as_bytes().trim_ascii().is_empty());
    let Some(header) = header else {
        if required {
            return Err(AppError::Unauthorized("missing authorization header".into()));
        }
        return Ok(next.run(request).await);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("invalid authorization scheme".into()))?;

    let claims = check_access_token(token, state.config.jwt_secret.as_bytes())?;
    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let Some(AuthenticatedUser(claims)) = request.extensions().get::<AuthenticatedUser>() else {
        return Err(AppError::Unauthorized("user is not authenticated".into()));
    };
    if claims.role != Role::Admin {
        warn!(user_id = %claims.id, role = %claims.role, "non-admin user refused");
        return Err(AppError::Forbidden("user is not authorized".into()));
    }
    Ok(next.run(request).await)
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("user is not authenticated".into()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthenticatedUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}
