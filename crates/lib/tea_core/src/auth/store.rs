//! Persistence boundary consumed by the session flows.

use async_trait::async_trait;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{NewUser, User};

/// User storage with a single refresh-identifier column per user.
///
/// `swap_refresh_identifier` must be atomic with respect to concurrent
/// callers: of two swaps expecting the same identifier, at most one succeeds.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Whether a user with this Telegram id exists.
    async fn exists(&self, telegram_id: i64) -> Result<bool, AuthError>;

    /// Insert a new user. A concurrent insert for the same Telegram id is not an error.
    async fn create(&self, user: &NewUser) -> Result<(), AuthError>;

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AuthError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Unconditionally overwrite the user's refresh identifier.
    async fn save_refresh_identifier(&self, user_id: Uuid, jti: Uuid) -> Result<(), AuthError>;

    /// Whether `jti` is the user's stored refresh identifier. False when none is stored.
    async fn is_refresh_identifier_current(
        &self,
        user_id: Uuid,
        jti: Uuid,
    ) -> Result<bool, AuthError>;

    /// Replace `expected` with `next` only if `expected` is still stored.
    async fn swap_refresh_identifier(
        &self,
        user_id: Uuid,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, AuthError>;

    /// Clear the refresh identifier. Returns false when the user does not exist.
    async fn clear_refresh_identifier(&self, user_id: Uuid) -> Result<bool, AuthError>;
}
