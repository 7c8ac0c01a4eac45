//! Auth-related database queries.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::store::UserStore;
use crate::models::auth::{NewUser, User};

const USER_COLUMNS: &str = "id, telegram_id, first_name, last_name, username, is_admin, \
                            refresh_token_id, created_at, updated_at";

/// PostgreSQL-backed [`UserStore`].
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn exists(&self, telegram_id: i64) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE telegram_id = $1)",
        )
        .bind(telegram_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, user: &NewUser) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO users (telegram_id, first_name, last_name, username, is_admin) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (telegram_id) DO NOTHING",
        )
        .bind(user.telegram_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(user.is_admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE telegram_id = $1"
        ))
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn save_refresh_identifier(&self, user_id: Uuid, jti: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET refresh_token_id = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_refresh_identifier_current(
        &self,
        user_id: Uuid,
        jti: Uuid,
    ) -> Result<bool, AuthError> {
        let current = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND refresh_token_id = $2)",
        )
        .bind(user_id)
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;
        Ok(current)
    }

    async fn swap_refresh_identifier(
        &self,
        user_id: Uuid,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, AuthError> {
        // The row lock taken by UPDATE serializes racing swaps; the loser
        // re-evaluates the predicate against the committed value and matches nothing.
        let result = sqlx::query(
            "UPDATE users SET refresh_token_id = $3, updated_at = now() \
             WHERE id = $1 AND refresh_token_id = $2",
        )
        .bind(user_id)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_identifier(&self, user_id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token_id = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
