//! Session cookie codec.
//!
//! A user id is rendered as decimal text, sealed with AES-GCM under a static
//! key and shipped as `base64url(nonce || ciphertext)`. Every decode failure
//! collapses into a single [`DecryptError`].

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use cookie::{Cookie, SameSite};
use rand::rngs::OsRng;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Default cookie name carrying the session.
pub const SESSION_COOKIE_NAME: &str = "user_id";

/// Default session lifetime: 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionKeyError {
    #[error("cookie key must be 16, 24 or 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Opaque failure to decode a session value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("session value could not be decrypted")]
pub struct DecryptError;

#[derive(Debug, thiserror::Error)]
#[error("session value could not be encrypted")]
pub struct EncryptError;

#[derive(Clone)]
enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

impl Cipher {
    fn from_key(key: &[u8]) -> Result<Self, SessionKeyError> {
        let cipher = match key.len() {
            16 => Aes128Gcm::new_from_slice(key).map(Cipher::Aes128),
            24 => Aes192Gcm::new_from_slice(key).map(Cipher::Aes192),
            32 => Aes256Gcm::new_from_slice(key).map(Cipher::Aes256),
            other => return Err(SessionKeyError::InvalidLength(other)),
        };
        cipher.map_err(|_| SessionKeyError::InvalidLength(key.len()))
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptError> {
        // All three variants share the 96-bit nonce size.
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = match self {
            Cipher::Aes128(c) => c.encrypt(&nonce, plaintext),
            Cipher::Aes192(c) => c.encrypt(&nonce, plaintext),
            Cipher::Aes256(c) => c.encrypt(&nonce, plaintext),
        }
        .map_err(|_| EncryptError)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, DecryptError> {
        if sealed.len() < NONCE_LEN {
            return Err(DecryptError);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::<U12>::from_slice(nonce);
        match self {
            Cipher::Aes128(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes192(c) => c.decrypt(nonce, ciphertext),
            Cipher::Aes256(c) => c.decrypt(nonce, ciphertext),
        }
        .map_err(|_| DecryptError)
    }
}

/// Encrypts user ids into cookie values and back.
#[derive(Clone)]
pub struct SessionCodec {
    cipher: Cipher,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Build a codec from raw key bytes. Fails unless the key is 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, SessionKeyError> {
        Ok(Self {
            cipher: Cipher::from_key(key)?,
        })
    }

    pub fn encrypt(&self, user_id: i64) -> Result<String, EncryptError> {
        let sealed = self.cipher.seal(user_id.to_string().as_bytes())?;
        Ok(URL_SAFE.encode(sealed))
    }

    pub fn decrypt(&self, token: &str) -> Result<i64, DecryptError> {
        let sealed = URL_SAFE.decode(token).map_err(|_| DecryptError)?;
        let plaintext = self.cipher.open(&sealed)?;
        std::str::from_utf8(&plaintext)
            .map_err(|_| DecryptError)?
            .parse::<i64>()
            .map_err(|_| DecryptError)
    }
}

/// Attributes applied to the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookieSettings {
    pub name: String,
    pub max_age_secs: i64,
}

impl Default for SessionCookieSettings {
    fn default() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            max_age_secs: SESSION_MAX_AGE_SECS,
        }
    }
}

impl SessionCookieSettings {
    /// Build the `Set-Cookie` value for a freshly minted session.
    pub fn issue(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::seconds(self.max_age_secs))
            .path("/")
            .build()
    }

    /// Build a cookie that clears the session on the client.
    pub fn expire(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), ""))
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .path("/")
            .build()
    }
}
