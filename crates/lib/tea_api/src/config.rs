//! API server configuration.

use tea_core::auth::jwt::resolve_jwt_secret;

/// Attributes of the refresh-token cookie.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieConfig {
    /// Whether the cookie carries the `Secure` attribute.
    pub secure: bool,
    /// Cookie `Path`; the browser only sends it to routes under this prefix.
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            path: "/auth".into(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Telegram bot token used to verify login payloads.
    pub bot_token: String,
    pub cookie: CookieConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                       | Default                          |
    /// |--------------------------------|----------------------------------|
    /// | `BIND_ADDR`                    | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL`                 | `postgres://localhost:5432/tea`  |
    /// | `JWT_SECRET_KEY` / `JWT_SECRET`| generated & persisted to file    |
    /// | `TELEGRAM_BOT_TOKEN`           | empty (every login is refused)   |
    /// | `COOKIE_SECURE`                | `true`                           |
    /// | `COOKIE_PATH`                  | `/auth`                          |
    pub fn from_env() -> Self {
        let defaults = CookieConfig::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/tea".into()),
            jwt_secret: resolve_jwt_secret(),
            bot_token: std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            cookie: CookieConfig {
                secure: std::env::var("COOKIE_SECURE")
                    .ok()
                    .and_then(|v| parse_flag(&v))
                    .unwrap_or(defaults.secure),
                path: std::env::var("COOKIE_PATH")
                    .ok()
                    .filter(|p| p.starts_with('/'))
                    .unwrap_or(defaults.path),
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
