//! Middleware composition.
//!
//! # Stage order (outermost first)
//! ```text
//! main chain:   RequestId → Tracing → Metrics → Logging → Recovery → Timeout → Identity → handler
//! infra chain:  RequestId → Recovery → handler
//! ```
//! - Tracing wraps everything so span duration covers all downstream work
//! - Metrics include logging and recovery cost
//! - Logging sits outside recovery, so a recovered panic is still logged
//!   as a completed request
//! - Recovery wraps the timeout, so an expired request is rendered and
//!   logged like any other failure
//! - Timeout bounds identity decoding and the handler
//!
//! The order is fixed when the pipeline is built and cannot change once it
//! has been applied to a router.

use axum::extract::Request;
use axum::http::Response;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;
use tracing::Span;

use crate::config::AppConfig;
use crate::error::ErrorHandler;
use crate::http::middleware::{
    identity_middleware, logging_middleware, metrics_middleware, recovery_middleware,
    timeout_middleware,
};
use crate::http::X_REQUEST_ID;
use crate::session::SessionCodec;

/// One interceptor in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestId,
    Tracing,
    Metrics,
    Logging,
    Timeout,
    Recovery,
    Identity,
}

/// What the stages need at construction time.
#[derive(Clone)]
pub struct PipelineDeps {
    pub codec: Arc<SessionCodec>,
    pub error_handler: Arc<dyn ErrorHandler>,
    pub request_timeout: Duration,
}

/// An ordered, immutable list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Full chain for application routes.
    pub fn main(config: &AppConfig) -> Self {
        let mut stages = vec![Stage::RequestId];
        if config.observability.tracing_enabled {
            stages.push(Stage::Tracing);
        }
        stages.extend([
            Stage::Metrics,
            Stage::Logging,
            Stage::Recovery,
            Stage::Timeout,
            Stage::Identity,
        ]);
        Self { stages }
    }

    /// Reduced chain for health and metrics endpoints.
    pub fn infrastructure() -> Self {
        Self {
            stages: vec![Stage::RequestId, Stage::Recovery],
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wrap `router` so the first stage is outermost.
    pub fn apply(&self, router: Router, deps: &PipelineDeps) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| apply_stage(router, *stage, deps))
    }
}

fn apply_stage(router: Router, stage: Stage, deps: &PipelineDeps) -> Router {
    match stage {
        Stage::RequestId => router
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)),
        Stage::Tracing => router.layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(
                    |res: &Response<_>, latency: Duration, span: &Span| {
                        span.record("http.status_code", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis() as u64);
                    },
                )
                // Failures are logged once, by the recovery stage.
                .on_failure(()),
        ),
        Stage::Metrics => router.layer(from_fn(metrics_middleware)),
        Stage::Logging => router.layer(from_fn(logging_middleware)),
        Stage::Timeout => router.layer(from_fn_with_state(
            deps.request_timeout,
            timeout_middleware,
        )),
        Stage::Recovery => router.layer(from_fn_with_state(
            Arc::clone(&deps.error_handler),
            recovery_middleware,
        )),
        Stage::Identity => router.layer(from_fn_with_state(
            Arc::clone(&deps.codec),
            identity_middleware,
        )),
    }
}

fn make_request_span(req: &Request) -> Span {
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    tracing::info_span!(
        "http.request",
        http.method = %req.method(),
        http.target = %req.uri(),
        http.status_code = Empty,
        latency_ms = Empty,
        request_id = %request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_chain_order() {
        assert_eq!(
            Pipeline::main(&AppConfig::default()).stages(),
            &[
                Stage::RequestId,
                Stage::Tracing,
                Stage::Metrics,
                Stage::Logging,
                Stage::Recovery,
                Stage::Timeout,
                Stage::Identity,
            ]
        );
    }

    #[test]
    fn tracing_stage_is_optional() {
        let mut config = AppConfig::default();
        config.observability.tracing_enabled = false;
        assert!(!Pipeline::main(&config).stages().contains(&Stage::Tracing));
    }

    #[test]
    fn infrastructure_chain_is_reduced() {
        let stages = Pipeline::infrastructure();
        assert_eq!(stages.stages(), &[Stage::RequestId, Stage::Recovery]);
    }
}
