//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::CookieJar;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tea_core::auth::session::{self, ACCESS_TOKEN_EXPIRY_SECS};
use tea_core::auth::telegram::{InitData, LoginPayload};
use tea_core::models::auth::{AccessTokenClaims, UserTokens};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::cookies::{REFRESH_COOKIE, refresh_cookie};

/// Access token handed to the client; the refresh token travels in a cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniAppRequest {
    pub init_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(flatten)]
    pub claims: Option<AccessTokenClaims>,
}

/// `POST /auth` — log in with a Telegram login widget payload.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginPayload>, AppError>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let tokens = session::authenticate_login(
        state.store.as_ref(),
        &payload,
        &state.config.bot_token,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(respond_with(&state, jar, tokens))
}

/// `POST /auth/mini-app` — log in with Telegram Mini App init data.
pub async fn mini_app_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(body), _): WithRejection<Json<MiniAppRequest>, AppError>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let init_data =
        InitData::parse(&body.init_data).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let tokens = session::authenticate_mini_app(
        state.store.as_ref(),
        &init_data,
        &state.config.bot_token,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(respond_with(&state, jar, tokens))
}

/// `POST /auth/refresh` — rotate the refresh cookie into a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("no refresh token".into()))?;
    let tokens = session::rotate(
        state.store.as_ref(),
        &refresh_token,
        state.config.jwt_secret.as_bytes(),
    )
    .await?;
    Ok(respond_with(&state, jar, tokens))
}

/// `GET /auth/me` — the caller's access claims.
pub async fn me_handler(AuthenticatedUser(claims): AuthenticatedUser) -> Json<AccessTokenClaims> {
    Json(claims)
}

/// `GET /auth/session` — whether the request carries a valid access token.
pub async fn session_handler(user: Option<AuthenticatedUser>) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: user.is_some(),
        claims: user.map(|AuthenticatedUser(claims)| claims),
    })
}

fn respond_with(
    state: &AppState,
    jar: CookieJar,
    tokens: UserTokens,
) -> (CookieJar, Json<TokenResponse>) {
    let cookie = refresh_cookie(
        &tokens.refresh.token,
        tokens.refresh.claims.exp,
        &state.config.cookie,
    );
    let body = TokenResponse {
        token: tokens.access.token,
        token_type: "Bearer".into(),
        expires_in: ACCESS_TOKEN_EXPIRY_SECS,
    };
    (jar.add(cookie), Json(body))
}
