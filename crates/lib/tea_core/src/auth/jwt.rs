//! JWT token issuance and verification.
//!
//! The codec is claim-shape-agnostic: it signs and verifies an open JSON
//! object and manages `exp`. Typed claim sets are validated separately in
//! [`crate::models::auth`].

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Open claim set as it appears on the wire.
pub type Claims = serde_json::Map<String, Value>;

/// Only the HMAC family is accepted; anything else in the header is rejected
/// before the signature is checked.
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Token codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token signing algorithm is not accepted")]
    InvalidAlgorithm,

    #[error("token is expired")]
    Expired,

    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    #[error("jwt encode: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::InvalidAlgorithm
            }
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenError::InvalidClaims(format!("{claim} can not be null"))
            }
            _ => TokenError::Malformed,
        }
    }
}

/// Sign `claims` with HS256, setting `exp` to now + `ttl`.
///
/// Returns the compact token and the embedded expiry (whole seconds).
pub fn issue(
    mut claims: Claims,
    secret: &[u8],
    ttl: Duration,
) -> Result<(String, DateTime<Utc>), TokenError> {
    let exp_secs = (Utc::now() + ttl).timestamp();
    let exp = DateTime::from_timestamp(exp_secs, 0)
        .ok_or_else(|| TokenError::Encode(format!("expiry out of range: {exp_secs}")))?;
    claims.insert("exp".to_string(), Value::from(exp_secs));

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))?;
    Ok((token, exp))
}

/// Verify a token's algorithm, signature and expiry, returning its raw claims.
///
/// No leeway is applied to `exp`.
pub fn parse(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
    if !ALLOWED_ALGORITHMS.contains(&header.alg) {
        return Err(TokenError::InvalidAlgorithm);
    }

    let mut validation = Validation::new(header.alg);
    validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(data.claims)
}

/// Resolve the JWT secret: env var `JWT_SECRET_KEY` → `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET_KEY", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(&secret_path, &secret) {
        warn!(path = %secret_path.display(), error = %e, "could not persist JWT secret");
    } else {
        info!(path = %secret_path.display(), "generated new JWT secret");
    }
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tea-api")
        .join("jwt-secret")
}
