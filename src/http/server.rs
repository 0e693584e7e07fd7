//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state (session codec, OAuth state guard, provider, cache)
//! - Wrap application routes in the main pipeline and infrastructure
//!   routes in the reduced one
//! - Bind to a listener and serve until shutdown
//! - Bound the drain of in-flight requests on shutdown

use axum::extract::FromRef;
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::app;
use crate::auth::{HttpOAuthProvider, OAuthConfig, OAuthProvider, StateGuard};
use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::error::ErrorHandler;
use crate::http::health::{self, HealthState};
use crate::http::pipeline::{Pipeline, PipelineDeps};
use crate::lifecycle::{Shutdown, StartupError};
use crate::session::{SessionCodec, Signer, SigningKey};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<SessionCodec>,
    pub state_guard: Arc<StateGuard>,
    pub provider: Arc<dyn OAuthProvider>,
    pub cache: Option<Arc<ResponseCache>>,
}

impl FromRef<AppState> for Arc<SessionCodec> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.codec)
    }
}

/// HTTP server for the web front end.
pub struct HttpServer {
    router: Router,
    config: Arc<AppConfig>,
    health: Arc<HealthState>,
}

impl HttpServer {
    pub fn builder(config: AppConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            provider: None,
            error_handler: None,
        }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    ///
    /// Connections still open `shutdown_secs` after the signal are dropped.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let health = Arc::clone(&self.health);
        let mut stop = shutdown.subscribe();
        let mut deadline = shutdown.subscribe();

        let serve = axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                health.mark_shutting_down();
                tracing::info!("Shutdown signal received, draining connections");
            });

        tokio::select! {
            result = serve.into_future() => result?,
            _ = async {
                if deadline.recv().await.is_err() {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Drain deadline reached, abandoning in-flight requests"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assembles an [`HttpServer`] from configuration.
///
/// The provider and error handler can be swapped, which is how tests run
/// the login flow without network access.
pub struct HttpServerBuilder {
    config: AppConfig,
    provider: Option<Arc<dyn OAuthProvider>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl HttpServerBuilder {
    pub fn provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<HttpServer, StartupError> {
        let config = Arc::new(self.config);

        let signer = Signer::new(SigningKey::from_hex(&config.session.secret)?);
        let codec = Arc::new(SessionCodec::new(
            signer.clone(),
            Duration::from_secs(config.session.max_age_secs),
        ));
        let state_guard = Arc::new(StateGuard::new(
            signer,
            Duration::from_secs(config.oauth.state_ttl_secs),
        ));

        let provider: Arc<dyn OAuthProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(HttpOAuthProvider::new(OAuthConfig::from_settings(
                &config.oauth,
            )?)?),
        };

        let cache = if config.cache.enabled {
            Some(Arc::new(ResponseCache::new(&config.cache)?))
        } else {
            None
        };

        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(app::AppErrorHandler));

        let oauth_mode = if config.is_bypass_auth() {
            "bypass"
        } else {
            "provider"
        };
        let mut health = HealthState::new(
            cache.clone(),
            config.observability.metrics_enabled,
            oauth_mode,
        );
        if config.tracer.enabled {
            health = health.with_tracer(config.tracer.endpoint.clone());
        }
        let health = Arc::new(health);

        let deps = PipelineDeps {
            codec: Arc::clone(&codec),
            error_handler,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let state = AppState {
            config: Arc::clone(&config),
            codec,
            state_guard,
            provider,
            cache,
        };

        let app = Pipeline::main(&config).apply(app::routes(state), &deps);
        let infrastructure =
            Pipeline::infrastructure().apply(health::routes(Arc::clone(&health)), &deps);

        tracing::debug!(
            oauth_mode,
            cache_enabled = config.cache.enabled,
            tracing_enabled = config.observability.tracing_enabled,
            trace_export = config.tracer.enabled,
            "Router assembled"
        );

        Ok(HttpServer {
            router: app.merge(infrastructure),
            config,
            health,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.secret = "13d6b4dff8f84a10".repeat(4);
        config.oauth.client_id = "client".into();
        config
    }

    #[test]
    fn rejects_bad_secret() {
        let mut config = config();
        config.session.secret = "zz".into();
        assert!(matches!(
            HttpServer::builder(config).build(),
            Err(StartupError::SessionKey(_))
        ));
    }

    #[tokio::test]
    async fn health_routes_are_mounted() {
        let server = HttpServer::builder(config()).build().unwrap();
        let response = server
            .router()
            .oneshot(
                axum::http::Request::get("/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let server = HttpServer::builder(config()).build().unwrap();
        let health = Arc::clone(server.health());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { server.run(listener, &shutdown).await })
        };
        while shutdown.receiver_count() < 2 {
            tokio::task::yield_now().await;
        }
        shutdown.trigger();

        handle.await.unwrap().unwrap();
        assert!(health.is_shutting_down());
    }
}
