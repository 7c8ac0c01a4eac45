//! Authentication domain models.
//!
//! Claim sets cross the wire as open JSON objects; `from_claims` on each
//! typed variant is the only way back to a trusted value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::jwt::{Claims, TokenError};

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_admin: bool,
    /// Identifier of the single live refresh token, if any.
    pub refresh_token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        if self.is_admin { Role::Admin } else { Role::User }
    }
}

/// Insert shape for first-login provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_admin: bool,
}

impl NewUser {
    /// A regular (non-admin) user; empty optional names are stored as NULL.
    pub fn new(
        telegram_id: i64,
        first_name: &str,
        last_name: Option<&str>,
        username: Option<&str>,
    ) -> Self {
        Self {
            telegram_id,
            first_name: first_name.to_string(),
            last_name: non_empty(last_name),
            username: non_empty(username),
            is_admin: false,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Authorization tier carried in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(TokenError::InvalidClaims(format!("unknown role '{other}'"))),
        }
    }
}

/// Claims embedded in access tokens (1 hour lifetime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    pub id: Uuid,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub role: Role,
    pub exp: DateTime<Utc>,
}

impl AccessTokenClaims {
    /// Wire claims for `user`, without `exp` (the codec sets it).
    pub fn claims_for(user: &User) -> Claims {
        let mut claims = Claims::new();
        claims.insert("id".into(), Value::from(user.id.to_string()));
        claims.insert("firstName".into(), Value::from(user.first_name.clone()));
        if let Some(username) = &user.username {
            claims.insert("username".into(), Value::from(username.clone()));
        }
        claims.insert("role".into(), Value::from(user.role().as_str()));
        claims
    }

    /// Validate presence and type of every access-token field.
    pub fn from_claims(claims: &Claims) -> Result<Self, TokenError> {
        Ok(Self {
            id: required_uuid(claims, "id")?,
            first_name: required_str(claims, "firstName")?.to_string(),
            username: optional_str(claims, "username")?.map(str::to_string),
            role: required_str(claims, "role")?.parse()?,
            exp: required_timestamp(claims, "exp")?,
        })
    }
}

/// Claims embedded in refresh tokens (7 day lifetime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshTokenClaims {
    pub id: Uuid,
    pub jti: Uuid,
    pub exp: DateTime<Utc>,
}

impl RefreshTokenClaims {
    /// Wire claims for a refresh token, without `exp`.
    pub fn claims_for(user_id: Uuid, jti: Uuid) -> Claims {
        let mut claims = Claims::new();
        claims.insert("id".into(), Value::from(user_id.to_string()));
        claims.insert("jti".into(), Value::from(jti.to_string()));
        claims
    }

    /// Validate presence and type of every refresh-token field.
    pub fn from_claims(claims: &Claims) -> Result<Self, TokenError> {
        Ok(Self {
            id: required_uuid(claims, "id")?,
            jti: required_uuid(claims, "jti")?,
            exp: required_timestamp(claims, "exp")?,
        })
    }
}

fn required<'a>(claims: &'a Claims, key: &str) -> Result<&'a Value, TokenError> {
    claims
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| TokenError::InvalidClaims(format!("{key} can not be null")))
}

fn required_str<'a>(claims: &'a Claims, key: &str) -> Result<&'a str, TokenError> {
    required(claims, key)?
        .as_str()
        .ok_or_else(|| TokenError::InvalidClaims(format!("invalid {key}")))
}

fn optional_str<'a>(claims: &'a Claims, key: &str) -> Result<Option<&'a str>, TokenError> {
    match claims.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(TokenError::InvalidClaims(format!("invalid {key}"))),
    }
}

fn required_uuid(claims: &Claims, key: &str) -> Result<Uuid, TokenError> {
    Uuid::parse_str(required_str(claims, key)?)
        .map_err(|_| TokenError::InvalidClaims(format!("invalid {key}")))
}

fn required_timestamp(claims: &Claims, key: &str) -> Result<DateTime<Utc>, TokenError> {
    required(claims, key)?
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| TokenError::InvalidClaims(format!("invalid {key}")))
}

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken<C> {
    pub token: String,
    pub claims: C,
}

/// Access + refresh pair produced by login and rotation.
#[derive(Debug, Clone)]
pub struct UserTokens {
    pub access: IssuedToken<AccessTokenClaims>,
    pub refresh: IssuedToken<RefreshTokenClaims>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(is_admin: bool, username: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            telegram_id: 42,
            first_name: "Ann".into(),
            last_name: None,
            username: username.map(str::to_string),
            is_admin,
            refresh_token_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn with_exp(mut claims: Claims) -> Claims {
        claims.insert("exp".into(), json!(1_900_000_000_i64));
        claims
    }

    #[test]
    fn access_claims_accept_well_formed_set() {
        let u = user(false, Some("ann"));
        let parsed = AccessTokenClaims::from_claims(&with_exp(AccessTokenClaims::claims_for(&u)))
            .unwrap();
        assert_eq!(parsed.id, u.id);
        assert_eq!(parsed.first_name, "Ann");
        assert_eq!(parsed.username.as_deref(), Some("ann"));
        assert_eq!(parsed.role, Role::User);
        assert_eq!(parsed.exp.timestamp(), 1_900_000_000);
    }

    #[test]
    fn admin_flag_maps_to_admin_role() {
        let claims = AccessTokenClaims::claims_for(&user(true, None));
        assert_eq!(claims["role"], json!("admin"));
        assert!(claims.get("username").is_none());
    }

    #[test]
    fn access_claims_reject_missing_fields() {
        let full = with_exp(AccessTokenClaims::claims_for(&user(false, None)));
        for key in ["id", "firstName", "role", "exp"] {
            let mut claims = full.clone();
            claims.remove(key);
            assert!(
                matches!(
                    AccessTokenClaims::from_claims(&claims),
                    Err(TokenError::InvalidClaims(_))
                ),
                "missing {key} should be rejected"
            );
        }
    }

    #[test]
    fn access_claims_reject_wrong_shapes() {
        let full = with_exp(AccessTokenClaims::claims_for(&user(false, None)));
        let cases = [
            ("id", json!("not-a-uuid")),
            ("id", json!(42)),
            ("firstName", json!(7)),
            ("role", json!("root")),
            ("role", json!(true)),
            ("exp", json!("1900000000")),
            ("username", json!(["ann"])),
        ];
        for (key, value) in cases {
            let mut claims = full.clone();
            claims.insert(key.into(), value.clone());
            assert!(
                AccessTokenClaims::from_claims(&claims).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn refresh_claims_require_uuid_jti() {
        let id = Uuid::new_v4();
        let jti = Uuid::new_v4();
        let claims = with_exp(RefreshTokenClaims::claims_for(id, jti));
        let parsed = RefreshTokenClaims::from_claims(&claims).unwrap();
        assert_eq!((parsed.id, parsed.jti), (id, jti));

        let mut bad = claims.clone();
        bad.insert("jti".into(), json!("abc"));
        assert!(RefreshTokenClaims::from_claims(&bad).is_err());

        let mut missing = claims;
        missing.remove("jti");
        assert!(RefreshTokenClaims::from_claims(&missing).is_err());
    }

    #[test]
    fn new_user_drops_empty_optional_names() {
        let u = NewUser::new(42, "Ann", Some(""), Some("ann"));
        assert_eq!(u.last_name, None);
        assert_eq!(u.username.as_deref(), Some("ann"));
        assert!(!u.is_admin);
    }
}
