//! Request timeout stage.
//!
//! Sits inside the recovery stage: an expired request becomes an
//! [`HttpError`] with status 408, which recovery logs and renders like any
//! other failure.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

use crate::error::HttpError;

#[derive(Debug, Error)]
#[error("request exceeded {0:?}")]
pub struct RequestTimeout(pub Duration);

pub async fn timeout_middleware(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => HttpError::new(StatusCode::REQUEST_TIMEOUT, "Request Timeout")
            .with_cause(RequestTimeout(limit))
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(limit: Duration) -> Router {
        Router::new()
            .route("/fast", get(|| async { "done" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                limit,
                timeout_middleware,
            ))
    }

    async fn call(uri: &str) -> Response {
        app(Duration::from_millis(50))
            .oneshot(axum::http::Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fast_requests_pass() {
        assert_eq!(call("/fast").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn slow_requests_become_http_errors() {
        let response = call("/slow").await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let err = response.extensions().get::<HttpError>().unwrap();
        assert_eq!(err.message(), "Request Timeout");
        assert!(err.cause().unwrap().to_string().contains("50ms"));
    }
}
