//! Mini-app handshake payload verification.
//!
//! The chat client hands the web app a URL-encoded bundle (`query_id`,
//! `user`, `auth_date`, `hash`, ...). The `hash` is an HMAC-SHA256 over the
//! remaining fields, keyed by a secret derived from the bot token:
//!
//! ```text
//! secret     = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! check      = sorted "key=value" lines joined by '\n'
//! hash       = hex(HMAC_SHA256(key = secret, msg = check))
//! ```
//!
//! The embedded `user` blob must never be read before the hash checks out.

use std::borrow::Cow;

use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Key used to derive the per-bot secret.
const SECRET_DERIVATION_KEY: &[u8] = b"WebAppData";

/// Payload accepted without verification when the dev bypass is enabled.
pub const DEV_BYPASS_PAYLOAD: &str = "dev";

/// Errors produced while validating a handshake payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("malformed handshake payload: {0}")]
    Parse(String),

    #[error("hash not found in handshake payload")]
    MissingHash,

    #[error("handshake hash mismatch")]
    InvalidSignature,

    #[error("malformed user data: {0}")]
    InvalidUser(String),
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedHandshake {
    /// Decoded `user` blob. `None` for the dev bypass or a payload without one.
    pub user: Option<String>,
    /// Whether the payload was accepted through the dev bypass.
    pub dev_bypass: bool,
}

impl VerifiedHandshake {
    /// Parse the verified user blob into its typed form.
    pub fn parse_user(&self) -> Result<Option<HandshakeUser>, HandshakeError> {
        self.user
            .as_deref()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| HandshakeError::InvalidUser(e.to_string()))
            })
            .transpose()
    }
}

/// User profile embedded in the handshake `user` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub is_premium: bool,
}

/// Validates handshake payloads against a bot token.
#[derive(Clone)]
pub struct HandshakeValidator {
    secret: [u8; 32],
    allow_dev_bypass: bool,
}

impl std::fmt::Debug for HandshakeValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeValidator")
            .field("allow_dev_bypass", &self.allow_dev_bypass)
            .finish_non_exhaustive()
    }
}

impl HandshakeValidator {
    /// Create a validator for the given bot token. The dev bypass starts disabled.
    pub fn new(bot_token: &str) -> Self {
        Self {
            secret: derive_secret(bot_token),
            allow_dev_bypass: false,
        }
    }

    /// Accept the literal `"dev"` payload without verification.
    ///
    /// Never enable this outside local development.
    pub fn with_dev_bypass(mut self, enabled: bool) -> Self {
        self.allow_dev_bypass = enabled;
        self
    }

    pub fn dev_bypass_enabled(&self) -> bool {
        self.allow_dev_bypass
    }

    /// Verify `init_data` and return the embedded user blob.
    pub fn validate(&self, init_data: &str) -> Result<VerifiedHandshake, HandshakeError> {
        if self.allow_dev_bypass && init_data == DEV_BYPASS_PAYLOAD {
            tracing::warn!("Handshake accepted through dev bypass");
            return Ok(VerifiedHandshake {
                user: None,
                dev_bypass: true,
            });
        }

        let mut fields = parse_fields(init_data)?;
        let hash_pos = fields
            .iter()
            .position(|(k, _)| k == "hash")
            .ok_or(HandshakeError::MissingHash)?;
        let (_, supplied_hash) = fields.remove(hash_pos);
        if supplied_hash.is_empty() {
            return Err(HandshakeError::MissingHash);
        }

        let check_string = data_check_string(&mut fields);
        let expected = hex::encode(sign(&self.secret, &check_string));

        if !bool::from(expected.as_bytes().ct_eq(supplied_hash.as_bytes())) {
            return Err(HandshakeError::InvalidSignature);
        }

        let user = fields
            .into_iter()
            .find(|(k, _)| k == "user")
            .map(|(_, v)| v)
            .filter(|v| !v.is_empty());

        Ok(VerifiedHandshake {
            user,
            dev_bypass: false,
        })
    }
}

/// Produce a signed, URL-encoded payload from `fields`.
///
/// Any `hash` entry in `fields` is ignored and replaced.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let secret = derive_secret(bot_token);
    let mut owned: Vec<(String, String)> = fields
        .iter()
        .filter(|(k, _)| *k != "hash")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = hex::encode(sign(&secret, &data_check_string(&mut owned)));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in &owned {
        serializer.append_pair(k, v);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

fn derive_secret(bot_token: &str) -> [u8; 32] {
    sign(SECRET_DERIVATION_KEY, bot_token)
}

/// `key` is at most 32 bytes here, below the 64-byte SHA-256 block, so
/// zero-padding it to a full block is exactly HMAC's own key schedule.
fn sign(key: &[u8], message: &str) -> [u8; 32] {
    let mut block = Key::<HmacSha256>::default();
    for (dst, src) in block.iter_mut().zip(key) {
        *dst = *src;
    }
    let mut mac = <HmacSha256 as KeyInit>::new(&block);
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().into()
}

/// Sort fields by key and join them as `key=value` lines.
fn data_check_string(fields: &mut [(String, String)]) -> String {
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a query string, keeping the first value of repeated keys.
fn parse_fields(init_data: &str) -> Result<Vec<(String, String)>, HandshakeError> {
    if init_data.contains(';') {
        return Err(HandshakeError::Parse("invalid semicolon separator".to_string()));
    }

    let mut fields: Vec<(String, String)> = Vec::new();
    for pair in init_data.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key)?;
        let value = decode_component(raw_value)?;
        if !fields.iter().any(|(existing, _)| *existing == key) {
            fields.push((key, value));
        }
    }
    Ok(fields)
}

/// Strictly decode one form component: `+` is a space, every `%` must start
/// a two-digit hex escape and the result must be UTF-8.
fn decode_component(raw: &str) -> Result<String, HandshakeError> {
    for (pos, _) in raw.match_indices('%') {
        let escape = raw.get(pos + 1..pos + 3);
        if !escape.is_some_and(|e| e.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err(HandshakeError::Parse(format!(
                "invalid percent escape at byte {}",
                pos
            )));
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| HandshakeError::Parse("escaped bytes are not valid UTF-8".to_string()))
}
