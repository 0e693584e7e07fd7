//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, capacity, TTL)
//! - Check that secrets decode and are long enough
//! - Reject bypass login outside dev mode
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AppConfig;

/// Minimum decoded length of the session signing secret.
pub const MIN_SECRET_BYTES: usize = 32;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.port must be non-zero")]
    ZeroPort,

    #[error("session.secret must be hex encoded")]
    SecretNotHex,

    #[error("session.secret must be at least {MIN_SECRET_BYTES} bytes, got {0}")]
    SecretTooShort(usize),

    #[error("session.max_age_secs must be non-zero")]
    ZeroSessionAge,

    #[error("cache.capacity must be non-zero")]
    ZeroCacheCapacity,

    #[error("cache.ttl_secs must be non-zero")]
    ZeroCacheTtl,

    #[error("cache.refresh_key must not be empty")]
    EmptyRefreshKey,

    #[error("authentication.bypass_token can only be used in dev mode")]
    BypassOutsideDev,

    #[error("authentication.{0} is required")]
    MissingOAuthField(&'static str),

    #[error("authentication.state_ttl_secs must be non-zero")]
    ZeroStateTtl,

    #[error("timeouts.request_secs must be non-zero")]
    ZeroRequestTimeout,

    #[error("tracer.endpoint must be an http(s) URL with a host")]
    InvalidTracerEndpoint,
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    match hex::decode(&config.session.secret) {
        Ok(bytes) if bytes.len() < MIN_SECRET_BYTES => {
            errors.push(ValidationError::SecretTooShort(bytes.len()));
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationError::SecretNotHex),
    }
    if config.session.max_age_secs == 0 {
        errors.push(ValidationError::ZeroSessionAge);
    }

    if config.cache.enabled {
        if config.cache.capacity == 0 {
            errors.push(ValidationError::ZeroCacheCapacity);
        }
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::ZeroCacheTtl);
        }
        if config.cache.refresh_key.is_empty() {
            errors.push(ValidationError::EmptyRefreshKey);
        }
    }

    if config.oauth.bypass_token.is_some() && !config.dev {
        errors.push(ValidationError::BypassOutsideDev);
    }
    if !config.is_bypass_auth() {
        if config.oauth.client_id.is_empty() {
            errors.push(ValidationError::MissingOAuthField("client_id"));
        }
        if config.oauth.redirect.is_empty() {
            errors.push(ValidationError::MissingOAuthField("redirect"));
        }
    }
    if config.oauth.state_ttl_secs == 0 {
        errors.push(ValidationError::ZeroStateTtl);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.tracer.enabled {
        let valid = url::Url::parse(&config.tracer.endpoint)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidTracerEndpoint);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
