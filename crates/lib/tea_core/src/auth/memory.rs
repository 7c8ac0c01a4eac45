//! In-process [`UserStore`] for tests and local development.
//!
//! Each user entry is guarded by its `DashMap` shard lock, so the
//! compare-and-swap on the refresh identifier is atomic per user.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::AuthError;
use super::store::UserStore;
use crate::models::auth::{NewUser, User};

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    by_telegram_id: DashMap<i64, Uuid>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the administrator flag. Returns false when the user does not exist.
    pub fn set_admin(&self, user_id: Uuid, is_admin: bool) -> bool {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.is_admin = is_admin;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Currently stored refresh identifier for a user.
    pub fn refresh_identifier(&self, user_id: Uuid) -> Option<Uuid> {
        self.users.get(&user_id).and_then(|u| u.refresh_token_id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn exists(&self, telegram_id: i64) -> Result<bool, AuthError> {
        Ok(self.by_telegram_id.contains_key(&telegram_id))
    }

    async fn create(&self, user: &NewUser) -> Result<(), AuthError> {
        if let Entry::Vacant(slot) = self.by_telegram_id.entry(user.telegram_id) {
            let now = Utc::now();
            let id = Uuid::new_v4();
            self.users.insert(
                id,
                User {
                    id,
                    telegram_id: user.telegram_id,
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    username: user.username.clone(),
                    is_admin: user.is_admin,
                    refresh_token_id: None,
                    created_at: now,
                    updated_at: now,
                },
            );
            slot.insert(id);
        }
        Ok(())
    }

    async fn get_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>, AuthError> {
        let Some(id) = self.by_telegram_id.get(&telegram_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn save_refresh_identifier(&self, user_id: Uuid, jti: Uuid) -> Result<(), AuthError> {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.refresh_token_id = Some(jti);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn is_refresh_identifier_current(
        &self,
        user_id: Uuid,
        jti: Uuid,
    ) -> Result<bool, AuthError> {
        Ok(self.refresh_identifier(user_id) == Some(jti))
    }

    async fn swap_refresh_identifier(
        &self,
        user_id: Uuid,
        expected: Uuid,
        next: Uuid,
    ) -> Result<bool, AuthError> {
        let Some(mut user) = self.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.refresh_token_id != Some(expected) {
            return Ok(false);
        }
        user.refresh_token_id = Some(next);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear_refresh_identifier(&self, user_id: Uuid) -> Result<bool, AuthError> {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.refresh_token_id = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
