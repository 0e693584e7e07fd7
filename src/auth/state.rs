//! Anti-CSRF state for the OAuth authorization round trip.
//!
//! # Lifecycle
//! ```text
//! Issued    → token minted, "oauthstate" cookie set, redirect to provider
//! Pending   → provider redirects back with ?code=…&state=…
//! Validated → cookie verified, state matches, cookie cleared
//! Rejected  → missing/forged/expired cookie or mismatch → InvalidState
//! ```
//!
//! The token lives only in the client's cookie. The cookie value is signed
//! and carries the expiry, so validation is a comparison plus a clock check.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::AuthError;
use crate::session::Signer;

/// Name of the state cookie.
pub const STATE_COOKIE: &str = "oauthstate";

/// Entropy of a state token in bytes.
const STATE_BYTES: usize = 16;

/// A freshly minted state token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    value: String,
    expires_at: u64,
}

impl StateToken {
    /// Value to send as the `state` parameter.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

/// Issues and validates state tokens.
#[derive(Debug, Clone)]
pub struct StateGuard {
    signer: Signer,
    ttl: Duration,
}

impl StateGuard {
    pub fn new(signer: Signer, ttl: Duration) -> Self {
        Self { signer, ttl }
    }

    /// Mint a token and the cookie that carries it.
    pub fn issue(&self) -> Result<(StateToken, Cookie<'static>), AuthError> {
        self.issue_at(unix_now())
    }

    fn issue_at(&self, now: u64) -> Result<(StateToken, Cookie<'static>), AuthError> {
        let mut bytes = [0u8; STATE_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(AuthError::StateGeneration)?;

        let token = StateToken {
            value: URL_SAFE_NO_PAD.encode(bytes),
            expires_at: now + self.ttl.as_secs(),
        };
        let payload = format!("{}:{}", token.value, token.expires_at);
        let signed = self.signer.sign(STATE_COOKIE, payload.as_bytes());

        let cookie = Cookie::build((STATE_COOKIE, signed))
            .path("/")
            .http_only(true)
            .secure(true)
            // The callback is a cross-site top-level navigation; Strict would drop it.
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(
                i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX),
            ))
            .build();

        Ok((token, cookie))
    }

    /// Check the callback's `state` against the cookie.
    ///
    /// On success returns the cookie that clears the state.
    pub fn validate(
        &self,
        jar: &CookieJar,
        state: Option<&str>,
    ) -> Result<Cookie<'static>, AuthError> {
        self.validate_at(jar, state, unix_now())
    }

    fn validate_at(
        &self,
        jar: &CookieJar,
        state: Option<&str>,
        now: u64,
    ) -> Result<Cookie<'static>, AuthError> {
        let cookie = jar.get(STATE_COOKIE).ok_or(AuthError::MissingState)?;

        let payload = self
            .signer
            .verify(STATE_COOKIE, cookie.value())
            .map_err(|_| AuthError::InvalidState)?;
        let payload = String::from_utf8(payload).map_err(|_| AuthError::InvalidState)?;
        let (value, expires_at) = payload.split_once(':').ok_or(AuthError::InvalidState)?;
        let expires_at: u64 = expires_at.parse().map_err(|_| AuthError::InvalidState)?;

        if now > expires_at {
            tracing::debug!(expires_at, now, "OAuth state expired");
            return Err(AuthError::InvalidState);
        }
        match state {
            Some(state) if !state.is_empty() && state == value => {}
            _ => return Err(AuthError::InvalidState),
        }

        let mut removal = Cookie::build((STATE_COOKIE, "")).path("/").build();
        removal.make_removal();
        Ok(removal)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
