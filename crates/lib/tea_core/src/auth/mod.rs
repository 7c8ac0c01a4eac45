//! Authentication and authorization logic.
//!
//! Provides Telegram identity verification, JWT management, the user store
//! boundary, and the session flows shared by `tea_api` and the server binary.

pub mod jwt;
pub mod memory;
pub mod queries;
pub mod session;
pub mod store;
pub mod telegram;

use thiserror::Error;

/// Authentication errors.
///
/// `Unauthorized` and `Forbidden` carry client-safe messages only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Token error: {0}")]
    TokenError(#[from] jwt::TokenError),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
