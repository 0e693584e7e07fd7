//! Infrastructure endpoints.
//!
//! - `/live`: liveness, always 200 while the process serves requests
//! - `/ready`: readiness with per-component checks, 503 once shutdown begins
//!   or when a configured dependency (the trace collector) is unreachable
//! - `/metrics`: Prometheus text exposition
//!
//! These routes run on the reduced pipeline so they answer even when an
//! application stage misbehaves.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::cache::ResponseCache;
use crate::observability::metrics;

/// Upper bound on the collector connect attempt.
const TRACER_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared readiness inputs.
pub struct HealthState {
    started: Instant,
    shutting_down: AtomicBool,
    cache: Option<Arc<ResponseCache>>,
    metrics_enabled: bool,
    oauth_mode: &'static str,
    tracer_endpoint: Option<String>,
}

impl HealthState {
    pub fn new(
        cache: Option<Arc<ResponseCache>>,
        metrics_enabled: bool,
        oauth_mode: &'static str,
    ) -> Self {
        Self {
            started: Instant::now(),
            shutting_down: AtomicBool::new(false),
            cache,
            metrics_enabled,
            oauth_mode,
            tracer_endpoint: None,
        }
    }

    /// Check TCP reachability of the OTLP collector on readiness.
    pub fn with_tracer(mut self, endpoint: impl Into<String>) -> Self {
        self.tracer_endpoint = Some(endpoint.into());
        self
    }

    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub response_cache: ComponentHealth,
    pub metrics: ComponentHealth,
    pub oauth: ComponentHealth,
    pub tracer: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy,
    NotConfigured,
}

impl ComponentHealth {
    fn healthy(details: Option<serde_json::Value>) -> Self {
        Self {
            status: ComponentStatus::Healthy,
            details,
        }
    }

    fn unhealthy(details: Option<serde_json::Value>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            details,
        }
    }

    fn not_configured() -> Self {
        Self {
            status: ComponentStatus::NotConfigured,
            details: None,
        }
    }
}

/// Router for the infrastructure endpoints, state applied.
pub fn routes(health: Arc<HealthState>) -> Router {
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/metrics", get(prometheus))
        .with_state(health)
}

async fn live(State(health): State<Arc<HealthState>>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        uptime_seconds: health.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ready(State(health): State<Arc<HealthState>>) -> Response {
    let response_cache = match &health.cache {
        Some(cache) => ComponentHealth::healthy(Some(serde_json::json!({
            "entries": cache.len(),
            "ttl_secs": cache.ttl().as_secs(),
        }))),
        None => ComponentHealth::not_configured(),
    };
    let recorder = match (health.metrics_enabled, metrics::is_initialized()) {
        (false, _) => ComponentHealth::not_configured(),
        (true, true) => ComponentHealth::healthy(None),
        (true, false) => ComponentHealth::unhealthy(None),
    };
    let oauth = ComponentHealth::healthy(Some(serde_json::json!({ "mode": health.oauth_mode })));
    let tracer = match &health.tracer_endpoint {
        Some(endpoint) => check_collector(endpoint).await,
        None => ComponentHealth::not_configured(),
    };

    let (code, status) = if health.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else if tracer.status == ComponentStatus::Unhealthy {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    } else {
        (StatusCode::OK, "ready")
    };

    let body = ReadinessResponse {
        status,
        uptime_seconds: health.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            response_cache,
            metrics: recorder,
            oauth,
            tracer,
        },
    };
    (code, Json(body)).into_response()
}

async fn check_collector(endpoint: &str) -> ComponentHealth {
    let details = Some(serde_json::json!({ "endpoint": endpoint }));
    let target = url::Url::parse(endpoint).ok().and_then(|url| {
        let host = url.host_str()?.to_owned();
        Some((host, url.port_or_known_default()?))
    });
    let Some((host, port)) = target else {
        return ComponentHealth::unhealthy(details);
    };

    let connect = TcpStream::connect((host.as_str(), port));
    match tokio::time::timeout(TRACER_CONNECT_TIMEOUT, connect).await {
        Ok(Ok(_)) => ComponentHealth::healthy(details),
        Ok(Err(e)) => {
            tracing::warn!(endpoint, error = %e, "Trace collector unreachable");
            ComponentHealth::unhealthy(details)
        }
        Err(_) => {
            tracing::warn!(endpoint, "Trace collector connect timed out");
            ComponentHealth::unhealthy(details)
        }
    }
}

async fn prometheus() -> Response {
    match metrics::render_metrics() {
        Some(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(axum::http::Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn live_reports_version() {
        let health = Arc::new(HealthState::new(None, false, "provider"));
        let (status, json) = get_json(routes(health), "/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn ready_turns_503_on_shutdown() {
        let health = Arc::new(HealthState::new(None, false, "bypass"));
        let (status, json) = get_json(routes(Arc::clone(&health)), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["checks"]["response_cache"]["status"], "not_configured");
        assert_eq!(json["checks"]["oauth"]["details"]["mode"], "bypass");

        health.mark_shutting_down();
        let (status, json) = get_json(routes(health), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "shutting_down");
    }

    #[tokio::test]
    async fn ready_reports_tracer_not_configured_by_default() {
        let health = Arc::new(HealthState::new(None, false, "provider"));
        let (status, json) = get_json(routes(health), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["checks"]["tracer"]["status"], "not_configured");
    }

    #[tokio::test]
    async fn ready_checks_collector_reachability() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/v1/traces", listener.local_addr().unwrap());

        let health = Arc::new(HealthState::new(None, false, "provider").with_tracer(&endpoint));
        let (status, json) = get_json(routes(Arc::clone(&health)), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["checks"]["tracer"]["status"], "healthy");
        assert_eq!(json["checks"]["tracer"]["details"]["endpoint"], endpoint.as_str());

        drop(listener);
        let (status, json) = get_json(routes(health), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "not_ready");
        assert_eq!(json["checks"]["tracer"]["status"], "unhealthy");
    }
}
