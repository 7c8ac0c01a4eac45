//! Administrator-only handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;
use tea_core::auth::session;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;

/// `DELETE /admin/users/{id}/session` — revoke a user's refresh session.
pub async fn revoke_session_handler(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<StatusCode> {
    session::revoke(state.store.as_ref(), user_id).await?;
    info!(admin_id = %admin.id, %user_id, "admin revoked refresh session");
    Ok(StatusCode::NO_CONTENT)
}
