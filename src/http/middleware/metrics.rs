//! Request metrics stage.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

use crate::observability::metrics::{record_request, InFlightGuard};

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let _in_flight = InFlightGuard::enter();

    let response = next.run(req).await;

    record_request(&method, response.status().as_u16(), start);
    response
}
