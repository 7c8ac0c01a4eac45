//! Request middleware.

pub mod auth;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::error;

use crate::error::InternalErrorDetail;

/// Log the detail of internal errors together with the request they failed.
pub async fn log_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if let Some(InternalErrorDetail(detail)) = response.extensions().get::<InternalErrorDetail>() {
        error!(%method, %path, status = %response.status(), "internal error: {detail}");
    }
    response
}
