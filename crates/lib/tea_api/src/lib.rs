//! # tea_api
//!
//! HTTP API library for Tea API: Telegram login, refresh-token rotation and
//! the authentication gates in front of protected routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::{delete, get, post};
use sqlx::PgPool;
use tea_core::auth::store::UserStore;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin, auth};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User persistence.
    pub store: Arc<dyn UserStore>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `tea_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tea_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Credentialed CORS cannot use wildcards; the refresh cookie needs credentials.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true);

    let public = Router::new()
        .route("/auth", post(auth::login_handler))
        .route("/auth/mini-app", post(auth::mini_app_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    let optional = Router::new()
        .route("/auth/session", get(auth::session_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let protected = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let admin = middleware::auth::admin_only(
        Router::new().route(
            "/admin/users/{id}/session",
            delete(admin::revoke_session_handler),
        ),
        state.clone(),
    );

    Router::new()
        .merge(public)
        .merge(optional)
        .merge(protected)
        .merge(admin)
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .layer(cors)
        .with_state(state)
}
