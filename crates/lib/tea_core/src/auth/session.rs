//! Session flows: Telegram login, refresh-token rotation, revocation.
//!
//! Each user has at most one live refresh token, identified by the `jti`
//! stored on the user row. Login overwrites it; rotation replaces it with a
//! compare-and-swap so a refresh token can be redeemed only once.

use chrono::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::AuthError;
use super::jwt::{self, TokenError};
use super::store::UserStore;
use super::telegram::{self, InitData, LoginPayload, VerifyError};
use crate::models::auth::{
    AccessTokenClaims, IssuedToken, NewUser, RefreshTokenClaims, User, UserTokens,
};

/// Access token lifetime: 1 hour.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Client-facing message for every rejection whose cause must not leak.
pub const NOT_AUTHORIZED: &str = "user is not authorized";

/// Sign an access token for `user`.
pub fn issue_access_token(
    user: &User,
    jwt_secret: &[u8],
) -> Result<IssuedToken<AccessTokenClaims>, AuthError> {
    let (token, exp) = jwt::issue(
        AccessTokenClaims::claims_for(user),
        jwt_secret,
        Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS),
    )?;
    Ok(IssuedToken {
        token,
        claims: AccessTokenClaims {
            id: user.id,
            first_name: user.first_name.clone(),
            username: user.username.clone(),
            role: user.role(),
            exp,
        },
    })
}

/// Sign a refresh token with a fresh random `jti`.
pub fn issue_refresh_token(
    user_id: Uuid,
    jwt_secret: &[u8],
) -> Result<IssuedToken<RefreshTokenClaims>, AuthError> {
    let jti = Uuid::new_v4();
    let (token, exp) = jwt::issue(
        RefreshTokenClaims::claims_for(user_id, jti),
        jwt_secret,
        Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
    )?;
    Ok(IssuedToken {
        token,
        claims: RefreshTokenClaims {
            id: user_id,
            jti,
            exp,
        },
    })
}

/// Validate a bearer access token and its claim shape.
pub fn check_access_token(token: &str, jwt_secret: &[u8]) -> Result<AccessTokenClaims, AuthError> {
    let claims = jwt::parse(token, jwt_secret).map_err(|e| rejected("access", e))?;
    AccessTokenClaims::from_claims(&claims).map_err(|e| rejected("access", e))
}

/// Log in with a Telegram login widget payload.
pub async fn authenticate_login(
    store: &dyn UserStore,
    payload: &LoginPayload,
    bot_token: &str,
    jwt_secret: &[u8],
) -> Result<UserTokens, AuthError> {
    telegram::verify_login(payload, bot_token)
        .map_err(|e| verification_failed(payload.id, e))?;
    establish_session(store, payload.to_new_user(), jwt_secret).await
}

/// Log in with Telegram Mini App init data.
pub async fn authenticate_mini_app(
    store: &dyn UserStore,
    init_data: &InitData,
    bot_token: &str,
    jwt_secret: &[u8],
) -> Result<UserTokens, AuthError> {
    telegram::verify_init_data(init_data, bot_token)
        .map_err(|e| verification_failed(init_data.user.id, e))?;
    establish_session(store, init_data.to_new_user(), jwt_secret).await
}

/// Exchange a refresh token for a new pair, invalidating the presented one.
pub async fn rotate(
    store: &dyn UserStore,
    refresh_token: &str,
    jwt_secret: &[u8],
) -> Result<UserTokens, AuthError> {
    let claims = jwt::parse(refresh_token, jwt_secret).map_err(|e| rejected("refresh", e))?;
    let claims = RefreshTokenClaims::from_claims(&claims).map_err(|e| rejected("refresh", e))?;

    if !store
        .is_refresh_identifier_current(claims.id, claims.jti)
        .await?
    {
        debug!(user_id = %claims.id, "refresh token identifier is not current");
        return Err(AuthError::Unauthorized(NOT_AUTHORIZED.into()));
    }

    let user = store
        .get_by_id(claims.id)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("user with id {} is not found", claims.id)))?;

    let access = issue_access_token(&user, jwt_secret)?;
    let refresh = issue_refresh_token(user.id, jwt_secret)?;

    if !store
        .swap_refresh_identifier(user.id, claims.jti, refresh.claims.jti)
        .await?
    {
        debug!(user_id = %user.id, "refresh token was redeemed concurrently");
        return Err(AuthError::Unauthorized(NOT_AUTHORIZED.into()));
    }

    Ok(UserTokens { access, refresh })
}

/// Clear a user's refresh identifier, forcing the next refresh to fail.
pub async fn revoke(store: &dyn UserStore, user_id: Uuid) -> Result<(), AuthError> {
    if !store.clear_refresh_identifier(user_id).await? {
        return Err(AuthError::NotFound(format!("user with id {user_id} is not found")));
    }
    info!(%user_id, "refresh session revoked");
    Ok(())
}

/// Provision on first login, then issue a pair and persist its `jti`.
async fn establish_session(
    store: &dyn UserStore,
    new_user: NewUser,
    jwt_secret: &[u8],
) -> Result<UserTokens, AuthError> {
    if !store.exists(new_user.telegram_id).await? {
        store.create(&new_user).await?;
        info!(telegram_id = new_user.telegram_id, "provisioned user on first login");
    }

    let user = store
        .get_by_telegram_id(new_user.telegram_id)
        .await?
        .ok_or_else(|| {
            AuthError::Internal(format!(
                "user with telegram id {} missing after provisioning",
                new_user.telegram_id
            ))
        })?;

    let access = issue_access_token(&user, jwt_secret)?;
    let refresh = issue_refresh_token(user.id, jwt_secret)?;
    store
        .save_refresh_identifier(user.id, refresh.claims.jti)
        .await?;

    Ok(UserTokens { access, refresh })
}

fn verification_failed(telegram_id: i64, err: VerifyError) -> AuthError {
    match err {
        VerifyError::InvalidConfiguration => error!("telegram verification error: {err}"),
        _ => debug!(telegram_id, "telegram verification error: {err}"),
    }
    AuthError::Forbidden(NOT_AUTHORIZED.into())
}

fn rejected(kind: &str, err: TokenError) -> AuthError {
    match err {
        TokenError::Expired => AuthError::Unauthorized(format!("{kind} token is expired")),
        other => {
            debug!(error = %other, "{kind} token rejected");
            AuthError::Unauthorized(NOT_AUTHORIZED.into())
        }
    }
}
