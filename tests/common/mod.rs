//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use d2s::auth::{OAuthProvider, ProviderError};
use d2s::config::AppConfig;
use d2s::session::Identity;
use d2s::HttpServer;

pub const SECRET: &str = "13d6b4dff8f84a1013d6b4dff8f84a1013d6b4dff8f84a1013d6b4dff8f84a10";

/// Valid configuration with metrics off and the cache on.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.session.secret = SECRET.to_string();
    config.oauth.client_id = "test-client".to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Provider double. Codes equal to `"bad"` are rejected.
#[derive(Default)]
pub struct FakeProvider {
    exchanged: AtomicBool,
}

impl FakeProvider {
    pub fn exchanged(&self) -> bool {
        self.exchanged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn auth_code_url(&self, state: &str) -> String {
        format!("https://provider.test/authorize?state={}", state)
    }

    async fn exchange(&self, code: &str) -> Result<String, ProviderError> {
        self.exchanged.store(true, Ordering::SeqCst);
        if code == "bad" {
            return Err(ProviderError::Rejected("bad_verification_code".into()));
        }
        Ok(format!("token-{}", code))
    }

    async fn fetch_user(&self, token: &str) -> Result<Identity, ProviderError> {
        Ok(Identity::new("Ada", "ada@example.com", token))
    }
}

/// Assembled router plus the provider it talks to.
pub fn app(config: AppConfig) -> (Router, Arc<FakeProvider>) {
    let provider = Arc::new(FakeProvider::default());
    let server = HttpServer::builder(config)
        .provider(provider.clone())
        .build()
        .unwrap();
    (server.router(), provider)
}

pub async fn get(router: &Router, uri: &str, headers: &[(&str, &str)]) -> Response {
    let mut req = Request::get(uri);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }
    router
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `name=value` of the first Set-Cookie for `name`.
pub fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
}

/// Counts ERROR-level and WARN-level events.
#[derive(Clone, Default)]
pub struct ErrorCounter {
    errors: Arc<AtomicUsize>,
    warnings: Arc<AtomicUsize>,
}

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            Level::ERROR => {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
            Level::WARN => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}
