//! Session cookie codec.
//!
//! Turns an [`Identity`] into a tamper-evident cookie value and back, with
//! no server-side storage. The signed payload is a small JSON envelope
//! carrying the identity and its issue time.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::session::identity::Identity;
use crate::session::signer::{SignatureError, Signer};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Failure reading or writing the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session cookie on the request. Not a failure from the client's
    /// point of view.
    #[error("no session cookie")]
    NotPresent,

    /// Signed correctly but older than the session max age.
    #[error("session expired")]
    Expired,

    #[error("session signature mismatch")]
    InvalidSignature,

    #[error("malformed session value")]
    Malformed,

    #[error("failed encoding user: {0}")]
    Encoding(#[source] serde_json::Error),
}

impl SessionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::NotPresent => "not_present",
            SessionError::Expired => "expired",
            SessionError::InvalidSignature => "invalid_signature",
            SessionError::Malformed => "malformed",
            SessionError::Encoding(_) => "encoding",
        }
    }
}

impl From<SignatureError> for SessionError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Invalid => SessionError::InvalidSignature,
            SignatureError::Malformed => SessionError::Malformed,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "u")]
    identity: &'a Identity,
    #[serde(rename = "iat")]
    issued_at: u64,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "u")]
    identity: Identity,
    #[serde(rename = "iat")]
    issued_at: u64,
}

/// Encodes and decodes the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    signer: Signer,
    max_age: Duration,
}

impl SessionCodec {
    pub fn new(signer: Signer, max_age: Duration) -> Self {
        Self { signer, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Serialize and sign an identity into a cookie-safe value.
    pub fn encode(&self, identity: &Identity) -> Result<String, SessionError> {
        self.encode_at(identity, unix_now())
    }

    fn encode_at(&self, identity: &Identity, issued_at: u64) -> Result<String, SessionError> {
        let payload = serde_json::to_vec(&EnvelopeRef {
            identity,
            issued_at,
        })
        .map_err(SessionError::Encoding)?;
        Ok(self.signer.sign(SESSION_COOKIE, &payload))
    }

    /// Verify and deserialize a cookie value.
    pub fn decode(&self, value: &str) -> Result<Identity, SessionError> {
        self.decode_at(value, unix_now())
    }

    fn decode_at(&self, value: &str, now: u64) -> Result<Identity, SessionError> {
        let payload = self.signer.verify(SESSION_COOKIE, value)?;
        let envelope: Envelope =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;

        if now.saturating_sub(envelope.issued_at) > self.max_age.as_secs() {
            return Err(SessionError::Expired);
        }
        Ok(envelope.identity)
    }

    /// Read the identity from a request's cookies.
    ///
    /// Returns [`SessionError::NotPresent`] when there is no session cookie.
    pub fn read(&self, jar: &CookieJar) -> Result<Identity, SessionError> {
        match jar.get(SESSION_COOKIE) {
            Some(cookie) => self.decode(cookie.value()),
            None => Err(SessionError::NotPresent),
        }
    }

    /// Build the `Set-Cookie` carrying `identity`.
    pub fn session_cookie(&self, identity: &Identity) -> Result<Cookie<'static>, SessionError> {
        let value = self.encode(identity)?;
        let mut cookie = base_cookie(value);
        cookie.set_max_age(time::Duration::seconds(
            i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX),
        ));
        Ok(cookie)
    }

    /// Build a cookie that deletes the session. Idempotent.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = base_cookie(String::new());
        cookie.make_removal();
        cookie
    }
}

fn base_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .build()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
