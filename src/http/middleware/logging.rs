//! Request logging stage.
//!
//! Emits "starting request" and "ending request" around the rest of the
//! chain. Runs outside recovery, so a panicking handler still produces an
//! "ending request" line with the recovered status.

use axum::body::HttpBody;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::Instrument;

use crate::http::X_REQUEST_ID;

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let span = tracing::info_span!("request", request_id = %request_id);

    async move {
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        tracing::info!(
            method = %req.method(),
            url = %req.uri(),
            user_agent = %user_agent,
            "starting request"
        );

        let response = next.run(req).await;

        tracing::info!(
            status = response.status().as_u16(),
            cached = response.headers().contains_key(header::EXPIRES),
            size = response.body().size_hint().exact().unwrap_or(0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "ending request"
        );
        response
    }
    .instrument(span)
    .await
}
