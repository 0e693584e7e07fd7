//! HMAC signing of cookie values.
//!
//! # Wire format
//! ```text
//! value = base64url(tag) ‖ base64url(payload)      (no padding)
//! tag   = HMAC-SHA256(key, cookie_name ‖ "=" ‖ base64url(payload))
//! ```
//!
//! The tag is always 43 characters, so the value needs no separator. The
//! tag covers the encoded payload text rather than the decoded bytes: any
//! change to the value, including one that breaks the base64 alphabet, is
//! reported as a signature mismatch before decoding is attempted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

use crate::config::validation::MIN_SECRET_BYTES;

type HmacSha256 = Hmac<Sha256>;

/// Encoded length of a SHA-256 tag in unpadded base64.
const TAG_LEN: usize = 43;

/// Errors building a signing key.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("signing key is not valid hex: {0}")]
    NotHex(#[from] hex::FromHexError),

    #[error("signing key must be at least {MIN_SECRET_BYTES} bytes, got {0}")]
    TooShort(usize),
}

/// Errors verifying a signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature mismatch")]
    Invalid,

    #[error("value is not a signed payload")]
    Malformed,
}

/// Server-wide secret. Never printed.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn from_hex(secret: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(secret)?;
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(KeyError::TooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(*****)")
    }
}

/// Signs and verifies cookie values with one key.
#[derive(Debug, Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Sign `payload` for the cookie called `name`.
    pub fn sign(&self, name: &str, payload: &[u8]) -> String {
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let mut mac = self.mac(name);
        mac.update(encoded.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        let mut value = String::with_capacity(tag.len() + encoded.len());
        value.push_str(&tag);
        value.push_str(&encoded);
        value
    }

    /// Verify a value produced by [`Signer::sign`] and return its payload.
    pub fn verify(&self, name: &str, value: &str) -> Result<Vec<u8>, SignatureError> {
        let raw = value.as_bytes();
        if raw.len() <= TAG_LEN {
            return Err(SignatureError::Malformed);
        }
        let (tag, encoded) = raw.split_at(TAG_LEN);

        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| SignatureError::Invalid)?;
        let mut mac = self.mac(name);
        mac.update(encoded);
        mac.verify_slice(&tag).map_err(|_| SignatureError::Invalid)?;

        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SignatureError::Malformed)
    }

    fn mac(&self, name: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key.0).expect("HMAC can take key of any size");
        mac.update(name.as_bytes());
        mac.update(b"=");
        mac
    }
}

#[cfg(test)]
pub(crate) fn test_signer() -> Signer {
    Signer::new(SigningKey::from_hex(&"13d6b4dff8f84a10".repeat(4)).unwrap())
}
