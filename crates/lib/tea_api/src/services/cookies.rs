//! Refresh-token cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use tea_core::auth::session::REFRESH_TOKEN_EXPIRY_DAYS;
use time::{Duration, OffsetDateTime};

use crate::config::CookieConfig;

/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Build the httpOnly refresh cookie, expiring together with the token.
pub fn refresh_cookie(
    token: &str,
    expires: DateTime<Utc>,
    config: &CookieConfig,
) -> Cookie<'static> {
    let builder = Cookie::build((REFRESH_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path(config.path.clone());
    match OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
        Ok(at) => builder.expires(at).build(),
        Err(_) => builder.max_age(Duration::days(REFRESH_TOKEN_EXPIRY_DAYS)).build(),
    }
}
