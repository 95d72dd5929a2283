//! Signed `initData` parsing and verification.
//!
//! The blob is a URL-encoded sequence of `key=value` pairs plus a `hash`
//! field. Verification is wire-compatible with the credential issuer:
//! the check string is all non-hash fields sorted by key and joined as
//! `key=value` lines with `\n`, the signing key is SHA-256 of the raw
//! secret bytes, and the signature is the hex HMAC-SHA256 of the check
//! string under that key. The comparison is constant-time; a length
//! mismatch rejects before any content is compared.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// User object embedded in the credential's `user` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl WebAppUser {
    /// Display name assembled from first/last name.
    pub fn nickname(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        format!("{first} {last}").trim().to_string()
    }
}

/// A successfully validated credential. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct TrustCredential {
    pub fields: BTreeMap<String, String>,
    pub auth_date: Option<i64>,
    pub user: Option<WebAppUser>,
}

impl TrustCredential {
    /// The authenticated user, or [`AuthError::MalformedUser`] when the
    /// credential carried no parseable user object.
    pub fn require_user(&self) -> Result<&WebAppUser, AuthError> {
        self.user.as_ref().ok_or(AuthError::MalformedUser)
    }
}

/// Parsed but unverified blob.
#[derive(Debug, Clone)]
pub struct ParsedInitData {
    pub hash: String,
    pub fields: BTreeMap<String, String>,
}

/// Trim a value that may arrive wrapped in quotes from an env file.
fn normalize_env_string(value: &str) -> String {
    let s = value.trim();
    let stripped = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    stripped.unwrap_or(s).trim().to_string()
}

/// Split the blob into the supplied hash and the signed fields.
///
/// A leading `?` is tolerated. The `hash` field carries the signature and
/// the `signature` field is issuer-internal; neither participates in the
/// check string.
pub fn parse_init_data(raw: &str) -> ParsedInitData {
    let trimmed = raw.trim();
    let normalized = trimmed.strip_prefix('?').unwrap_or(trimmed);

    let mut hash = String::new();
    let mut fields = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(normalized.as_bytes()) {
        match key.as_ref() {
            "hash" => hash = value.into_owned(),
            "signature" => {}
            _ => {
                fields.insert(key.into_owned(), value.into_owned());
            }
        }
    }

    ParsedInitData { hash, fields }
}

/// Canonical check string: sorted `key=value` lines joined with `\n`.
pub fn build_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validate a credential blob against the configured secret.
///
/// `max_age_seconds = 0` disables the freshness check.
pub fn validate(
    init_data: &str,
    secret: &str,
    max_age_seconds: u64,
) -> Result<TrustCredential, AuthError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    validate_at(init_data, secret, max_age_seconds, now)
}

/// [`validate`] with an explicit clock, for deterministic tests.
pub fn validate_at(
    init_data: &str,
    secret: &str,
    max_age_seconds: u64,
    now: i64,
) -> Result<TrustCredential, AuthError> {
    let init_data = normalize_env_string(init_data);
    if init_data.is_empty() {
        return Err(AuthError::MissingInitData);
    }

    let secret = normalize_env_string(secret);
    if secret.is_empty() {
        return Err(AuthError::MissingSecret);
    }

    let parsed = parse_init_data(&init_data);
    if parsed.hash.is_empty() {
        return Err(AuthError::MissingHash);
    }

    let check_string = build_check_string(&parsed.fields);
    let signing_key = Sha256::digest(secret.as_bytes());

    let mut mac = HmacSha256::new_from_slice(signing_key.as_slice())
        .expect("HMAC accepts keys of any length");
    mac.update(check_string.as_bytes());

    // Hex decode doubles as the length gate: anything that is not exactly
    // a 32-byte digest is rejected without touching the MAC comparison.
    let supplied = hex::decode(parsed.hash.to_lowercase())
        .map_err(|_| AuthError::SignatureMismatch)?;
    if supplied.len() != Sha256::output_size() {
        return Err(AuthError::SignatureMismatch);
    }
    mac.verify_slice(&supplied)
        .map_err(|_| AuthError::SignatureMismatch)?;

    let auth_date = parsed
        .fields
        .get("auth_date")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0);

    if let Some(auth_date) = auth_date {
        if max_age_seconds > 0 && now - auth_date > max_age_seconds as i64 {
            return Err(AuthError::Expired);
        }
    }

    let user = parsed
        .fields
        .get("user")
        .and_then(|raw| serde_json::from_str::<WebAppUser>(raw).ok());

    Ok(TrustCredential {
        fields: parsed.fields,
        auth_date,
        user,
    })
}
