//! OAuth provider collaborator.
//!
//! The server only needs three things from the provider: where to send the
//! browser, how to turn a code into a token, and who the token belongs to.
//! [`HttpOAuthProvider`] does this against a GitHub-style authorization
//! server; tests substitute their own implementation.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::OAuthSettings;
use crate::session::Identity;

/// Provider-side failure.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// Invalid provider configuration. Fatal at startup.
#[derive(Debug, Error)]
#[error("authentication.{field}: invalid url: {source}")]
pub struct ProviderConfigError {
    field: &'static str,
    #[source]
    source: url::ParseError,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL of the provider's consent page for `state`.
    fn auth_code_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token.
    async fn exchange(&self, code: &str) -> Result<String, ProviderError>;

    /// Look up the profile owning `token`.
    async fn fetch_user(&self, token: &str) -> Result<Identity, ProviderError>;
}

/// Explicit provider configuration, built once from settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    client_id: String,
    client_secret: String,
    redirect_url: Url,
    auth_url: Url,
    token_url: Url,
    user_url: Url,
    scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn from_settings(settings: &OAuthSettings) -> Result<Self, ProviderConfigError> {
        let parse = |field: &'static str, value: &str| {
            Url::parse(value).map_err(|source| ProviderConfigError { field, source })
        };

        Ok(Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_url: parse("redirect", &settings.redirect)?,
            auth_url: parse("auth_url", &settings.auth_url)?,
            token_url: parse("token_url", &settings.token_url)?,
            user_url: parse("user_url", &settings.user_url)?,
            scopes: settings.scopes.clone(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    login: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

/// Provider speaking the GitHub flavour of OAuth 2.
pub struct HttpOAuthProvider {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl HttpOAuthProvider {
    pub fn new(config: OAuthConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(5)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    fn auth_code_url(&self, state: &str) -> String {
        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_url.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        url.into()
    }

    async fn exchange(&self, code: &str) -> Result<String, ProviderError> {
        let response: TokenResponse = self
            .client
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json")
            .json(&serde_json::json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "code": code,
                "redirect_uri": self.config.redirect_url.as_str(),
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ProviderError::Rejected(
                response
                    .error_description
                    .or(response.error)
                    .unwrap_or_else(|| "no access token in response".to_string()),
            )),
        }
    }

    async fn fetch_user(&self, token: &str) -> Result<Identity, ProviderError> {
        let user: UserResponse = self
            .client
            .get(self.config.user_url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("d2s/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let name = user
            .name
            .filter(|n| !n.is_empty())
            .or(user.login)
            .unwrap_or_default();
        Ok(Identity::new(name, user.email.unwrap_or_default(), token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OAuthSettings {
        OAuthSettings {
            client_id: "my-client".into(),
            client_secret: "shh".into(),
            ..OAuthSettings::default()
        }
    }

    #[test]
    fn auth_code_url_carries_state() {
        let provider =
            HttpOAuthProvider::new(OAuthConfig::from_settings(&settings()).unwrap()).unwrap();
        let url = Url::parse(&provider.auth_code_url("abc-123")).unwrap();

        assert_eq!(url.host_str(), Some("github.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".into(), "abc-123".into())));
        assert!(pairs.contains(&("client_id".into(), "my-client".into())));
        assert!(pairs.contains(&("scope".into(), "read:user user:email".into())));
        assert!(!url.as_str().contains("shh"));
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        let mut settings = settings();
        settings.token_url = "not a url".into();
        let err = OAuthConfig::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("token_url"));
    }
}
