//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.
//! Types holding secrets implement `Debug` by hand so that dumping the
//! configuration never prints key material.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Development mode (verbose logs, bypass login allowed).
    pub dev: bool,

    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// OAuth provider settings.
    #[serde(rename = "authentication")]
    pub oauth: OAuthSettings,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    #[serde(rename = "logger")]
    pub observability: ObservabilityConfig,

    /// Trace export settings.
    pub tracer: TracerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Directory of static assets served for paths no route matches.
    pub public: Option<String>,
}

impl AppConfig {
    /// Whether login goes through the bypass token instead of the provider.
    pub fn is_bypass_auth(&self) -> bool {
        self.dev && self.oauth.bypass_token.is_some()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to listen on. Empty means all interfaces.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl ListenerConfig {
    /// Socket address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { &self.host };
        format!("{}:{}", host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8080,
        }
    }
}

/// Session cookie configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hex-encoded signing secret (at least 32 bytes once decoded).
    pub secret: String,

    /// Max-Age of the session cookie in seconds.
    pub max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            max_age_secs: 3600,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &redact(&self.secret))
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

/// OAuth provider configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Client identifier registered with the provider.
    pub client_id: String,

    /// Client secret registered with the provider.
    pub client_secret: String,

    /// Callback URL the provider redirects back to.
    pub redirect: String,

    /// Authorization endpoint.
    pub auth_url: String,

    /// Token exchange endpoint.
    pub token_url: String,

    /// User profile endpoint.
    pub user_url: String,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// Validity window of the anti-CSRF state cookie in seconds.
    pub state_ttl_secs: u64,

    /// Access token used to sign in without the provider round trip (dev only).
    pub bypass_token: Option<String>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect: "http://localhost:8080/auth/callback".to_string(),
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            user_url: "https://api.github.com/user".to_string(),
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
            state_ttl_secs: 1200,
            bypass_token: None,
        }
    }
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect", &self.redirect)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("user_url", &self.user_url)
            .field("scopes", &self.scopes)
            .field("state_ttl_secs", &self.state_ttl_secs)
            .field(
                "bypass_token",
                &redact(self.bypass_token.as_deref().unwrap_or_default()),
            )
            .finish()
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache on cacheable routes.
    pub enabled: bool,

    /// Maximum number of stored responses.
    pub capacity: usize,

    /// Time-to-live of a stored response in seconds.
    pub ttl_secs: u64,

    /// Query parameter forcing recomputation.
    pub refresh_key: String,

    /// Request headers taking part in the fingerprint.
    pub vary_headers: Vec<String>,

    /// Largest body stored, in bytes.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 10_000,
            ttl_secs: 600,
            refresh_key: "opn".to_string(),
            vary_headers: vec!["Hx-Request".to_string()],
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(rename = "level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,

    /// Enable the tracing stage of the middleware chain.
    pub tracing_enabled: bool,

    /// Enable the Prometheus recorder and `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: true,
            tracing_enabled: true,
            metrics_enabled: true,
        }
    }
}

/// OTLP trace export.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Export spans to the collector.
    pub enabled: bool,

    /// OTLP/HTTP traces endpoint.
    pub endpoint: String,

    /// Extra request headers sent to the collector (usually credentials).
    pub headers: BTreeMap<String, String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4318/v1/traces".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for TracerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<&str> = self.headers.keys().map(String::as_str).collect();
        f.debug_struct("TracerConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("headers", &headers)
            .finish()
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time given to in-flight requests on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 30,
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "*****"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let mut config = AppConfig::default();
        config.session.secret = "deadbeef".repeat(8);
        config.oauth.client_secret = "s3cr3t".to_string();
        config
            .tracer
            .headers
            .insert("authorization".into(), "Bearer otlp-key".into());

        let dumped = format!("{:?}", config);
        assert!(!dumped.contains("deadbeef"));
        assert!(!dumped.contains("s3cr3t"));
        assert!(!dumped.contains("otlp-key"));
        assert!(dumped.contains("authorization"));
        assert!(dumped.contains("*****"));
        assert!(dumped.contains("<unset>")); // bypass token
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            dev = true

            [listener]
            port = 9000

            [cache]
            capacity = 5
            "#,
        )
        .unwrap();

        assert!(config.dev);
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.cache.capacity, 5);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.refresh_key, "opn");
        assert_eq!(config.session.max_age_secs, 3600);
        assert_eq!(config.oauth.state_ttl_secs, 1200);
        assert!(!config.tracer.enabled);
    }

    #[test]
    fn bypass_requires_dev() {
        let mut config = AppConfig::default();
        config.oauth.bypass_token = Some("token".into());
        assert!(!config.is_bypass_auth());
        config.dev = true;
        assert!(config.is_bypass_auth());
    }

    #[test]
    fn bind_address_defaults_to_all_interfaces() {
        let listener = ListenerConfig::default();
        assert_eq!(listener.bind_address(), "0.0.0.0:8080");
    }
}
