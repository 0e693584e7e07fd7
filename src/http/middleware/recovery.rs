//! Recovery stage: the boundary between handlers and the rest of the chain.
//!
//! # Responsibilities
//! - Catch panics from everything inside it and turn them into errors
//! - Render every [`HttpError`] through the configured [`ErrorHandler`]
//! - Log each failed request exactly once
//!
//! Handlers hand back complete `Response` values, so there is never a
//! partially written body to reconcile when a panic is caught.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::{ErrorHandler, HttpError, RequestMeta};
use crate::http::{HX_REQUEST, X_REQUEST_ID};
use crate::observability::metrics::record_panic;

pub async fn recovery_middleware(
    State(handler): State<Arc<dyn ErrorHandler>>,
    req: Request,
    next: Next,
) -> Response {
    let meta = request_meta(&req);

    let response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            record_panic();
            let err = HttpError::from_panic(payload);
            tracing::error!(
                request_id = %meta.request_id,
                method = %meta.method,
                path = %meta.path,
                cause = %err,
                "recovering from panic!"
            );
            return handler.render(&meta, &err);
        }
    };

    let Some(err) = response.extensions().get::<HttpError>().cloned() else {
        return response;
    };
    log_error(&meta, &err);

    let mut rendered = handler.render(&meta, &err);
    // Cookie changes made alongside the error still apply.
    for cookie in response.headers().get_all(header::SET_COOKIE) {
        rendered
            .headers_mut()
            .append(header::SET_COOKIE, cookie.clone());
    }
    rendered
}

fn request_meta(req: &Request) -> RequestMeta {
    RequestMeta {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        request_id: req
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        partial: req.headers().contains_key(HX_REQUEST),
    }
}

fn log_error(meta: &RequestMeta, err: &HttpError) {
    let cause = err.cause().map(|c| c.to_string()).unwrap_or_default();
    if err.status().is_server_error() {
        tracing::error!(
            request_id = %meta.request_id,
            method = %meta.method,
            path = %meta.path,
            status = err.status().as_u16(),
            cause = %cause,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id = %meta.request_id,
            method = %meta.method,
            path = %meta.path,
            status = err.status().as_u16(),
            message = %err.message(),
            cause = %cause,
            "Request rejected"
        );
    }
}
