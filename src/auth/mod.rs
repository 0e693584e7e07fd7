//! OAuth login support.
//!
//! # Data Flow
//! ```text
//! GET /auth/login
//!     → state.rs (mint token, set "oauthstate" cookie)
//!     → provider.rs (authorization URL) → 307 to provider
//!
//! GET /auth/callback?code&state
//!     → state.rs (cookie vs. query, expiry)   ← rejects before any exchange
//!     → provider.rs (exchange code, fetch user)
//!     → session codec writes the identity cookie
//! ```

pub mod provider;
pub mod state;

use thiserror::Error;

pub use provider::{
    HttpOAuthProvider, OAuthConfig, OAuthProvider, ProviderConfigError, ProviderError,
};
pub use state::{StateGuard, StateToken, STATE_COOKIE};

/// Failure during the login round trip.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to retrieve cookie: {STATE_COOKIE}")]
    MissingState,

    #[error("invalid oauth state")]
    InvalidState,

    #[error("invalid oauth code: {0}")]
    InvalidCode(#[source] ProviderError),

    #[error("failed to generate cookie: {STATE_COOKIE}: {0}")]
    StateGeneration(#[source] rand::Error),

    #[error("oauth provider call failed: {0}")]
    Provider(#[source] ProviderError),
}
