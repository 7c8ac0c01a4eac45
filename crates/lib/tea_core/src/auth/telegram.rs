//! Telegram identity verification.
//!
//! Both the login widget and Mini App init data are signed with an
//! HMAC-SHA256 over a data-check-string: every non-empty field except
//! `hash`, rendered `key=value`, sorted, joined by `\n`. They differ only in
//! how the HMAC key is derived from the bot token.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::auth::NewUser;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the Mini App secret from the bot token.
const WEB_APP_KEY: &[u8] = b"WebAppData";

/// Identity verification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("telegram bot token is not configured")]
    InvalidConfiguration,

    #[error("hashes are not equal")]
    SignatureMismatch,

    #[error("malformed init data: {0}")]
    MalformedInitData(String),
}

/// How the HMAC key is derived from the bot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    /// Login widget: `SHA-256(bot_token)`.
    LoginWidget,
    /// Mini App: `HMAC-SHA256("WebAppData", bot_token)`.
    WebApp,
}

/// Payload posted by the Telegram login widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginPayload {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub auth_date: i64,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub hash: String,
}

impl LoginPayload {
    /// Canonical data-check-string for this payload.
    pub fn check_string(&self) -> String {
        check_string([
            ("auth_date", self.auth_date.to_string()),
            ("first_name", self.first_name.clone()),
            ("id", self.id.to_string()),
            ("last_name", self.last_name.clone().unwrap_or_default()),
            ("username", self.username.clone().unwrap_or_default()),
            ("photo_url", self.photo_url.clone().unwrap_or_default()),
        ])
    }

    pub fn to_new_user(&self) -> NewUser {
        NewUser::new(
            self.id,
            &self.first_name,
            self.last_name.as_deref(),
            self.username.as_deref(),
        )
    }
}

/// User object embedded in Mini App init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InitDataUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Unpacked Mini App init data.
///
/// Every received pair except `hash` takes part in the check-string, so
/// fields this type does not model are still covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitData {
    pairs: Vec<(String, String)>,
    hash: String,
    pub auth_date: i64,
    pub user: InitDataUser,
}

impl InitData {
    /// Unpack a raw URL-encoded init-data string.
    pub fn parse(raw: &str) -> Result<Self, VerifyError> {
        let mut pairs = Vec::new();
        let mut hash = None;
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key == "hash" {
                hash = Some(value.into_owned());
            } else {
                pairs.push((key.into_owned(), value.into_owned()));
            }
        }

        let hash = hash.ok_or_else(|| VerifyError::MalformedInitData("hash is missing".into()))?;
        let field = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| VerifyError::MalformedInitData(format!("{name} is missing")))
        };
        let auth_date = field("auth_date")?
            .parse::<i64>()
            .map_err(|_| VerifyError::MalformedInitData("invalid auth_date".into()))?;
        let user: InitDataUser = serde_json::from_str(field("user")?)
            .map_err(|e| VerifyError::MalformedInitData(format!("invalid user: {e}")))?;

        Ok(Self {
            pairs,
            hash,
            auth_date,
            user,
        })
    }

    /// Canonical data-check-string for this init data.
    pub fn check_string(&self) -> String {
        check_string(self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn to_new_user(&self) -> NewUser {
        NewUser::new(
            self.user.id,
            &self.user.first_name,
            self.user.last_name.as_deref(),
            self.user.username.as_deref(),
        )
    }
}

/// Build a data-check-string, omitting fields whose value is empty.
pub fn check_string<I, K, V>(fields: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut lines: Vec<String> = fields
        .into_iter()
        .filter(|(_, v)| !v.as_ref().is_empty())
        .map(|(k, v)| format!("{}={}", k.as_ref(), v.as_ref()))
        .collect();
    lines.sort();
    lines.join("\n")
}

/// Verify a login widget payload against the bot token.
pub fn verify_login(payload: &LoginPayload, bot_token: &str) -> Result<(), VerifyError> {
    verify(
        &payload.check_string(),
        &payload.hash,
        bot_token,
        KeyDerivation::LoginWidget,
    )
}

/// Verify Mini App init data against the bot token.
pub fn verify_init_data(init_data: &InitData, bot_token: &str) -> Result<(), VerifyError> {
    verify(
        &init_data.check_string(),
        &init_data.hash,
        bot_token,
        KeyDerivation::WebApp,
    )
}

/// Hex HMAC of `check_string` under the key derived from `bot_token`.
pub fn sign(
    check_string: &str,
    bot_token: &str,
    derivation: KeyDerivation,
) -> Result<String, VerifyError> {
    let mut mac = keyed_mac(bot_token, derivation)?;
    mac.update(check_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(
    check_string: &str,
    hash: &str,
    bot_token: &str,
    derivation: KeyDerivation,
) -> Result<(), VerifyError> {
    let mut mac = keyed_mac(bot_token, derivation)?;
    let expected = hex::decode(hash).map_err(|_| VerifyError::SignatureMismatch)?;
    mac.update(check_string.as_bytes());
    // verify_slice compares in constant time
    mac.verify_slice(&expected)
        .map_err(|_| VerifyError::SignatureMismatch)
}

fn keyed_mac(bot_token: &str, derivation: KeyDerivation) -> Result<HmacSha256, VerifyError> {
    if bot_token.is_empty() {
        return Err(VerifyError::InvalidConfiguration);
    }
    let key = match derivation {
        KeyDerivation::LoginWidget => Sha256::digest(bot_token.as_bytes()).to_vec(),
        KeyDerivation::WebApp => {
            let mut mac = HmacSha256::new_from_slice(WEB_APP_KEY)
                .map_err(|_| VerifyError::InvalidConfiguration)?;
            mac.update(bot_token.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    HmacSha256::new_from_slice(&key).map_err(|_| VerifyError::InvalidConfiguration)
}
