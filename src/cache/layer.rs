//! Cache middleware, applied per route with `route_layer`.

use axum::body::{Body, HttpBody};
use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::cache::{CachedResponse, Fingerprint, ResponseCache};
use crate::error::HttpError;
use crate::observability::metrics::record_cache;

pub async fn cache_middleware(
    State(cache): State<Arc<ResponseCache>>,
    req: Request,
    next: Next,
) -> Response {
    if !matches!(*req.method(), Method::GET | Method::HEAD) {
        return next.run(req).await;
    }

    let key = cache.fingerprint(&req);

    if cache.invalidate_on_refresh(&req) {
        record_cache("refresh");
        tracing::debug!(fingerprint = %key, "Cache refresh requested");
        let response = next.run(req).await;
        return store(&cache, key, response).await;
    }

    if let Some(hit) = cache.get(&key) {
        record_cache("hit");
        return hit.to_response(cache.ttl());
    }

    let flight = cache.flight(&key).await;
    if flight.waited() {
        if let Some(hit) = cache.get(&key) {
            record_cache("coalesced");
            tracing::trace!(fingerprint = %key, "Served from coalesced computation");
            return hit.to_response(cache.ttl());
        }
    }

    record_cache("miss");
    let response = next.run(req).await;
    let response = store(&cache, key, response).await;
    drop(flight);
    response
}

/// Store `response` if it is cacheable and hand it back either way.
async fn store(cache: &ResponseCache, key: Fingerprint, response: Response) -> Response {
    if !is_cacheable(cache, &response) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, cache.max_body_bytes()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The body is gone; nothing left to serve.
            return HttpError::internal(err).into_response();
        }
    };

    cache.put(
        key,
        CachedResponse::new(parts.status, parts.headers.clone(), bytes.clone()),
    );
    record_cache("store");

    Response::from_parts(parts, Body::from(bytes))
}

fn is_cacheable(cache: &ResponseCache, response: &Response) -> bool {
    if response.status().as_u16() >= 400 {
        return false;
    }
    // Never replay one client's cookies to another.
    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }
    match response.body().size_hint().exact() {
        Some(len) => len <= cache.max_body_bytes() as u64,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn app(cache: Arc<ResponseCache>, calls: Arc<AtomicUsize>) -> Router {
        let counted = |calls: Arc<AtomicUsize>| {
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    format!("render #{}", n)
                }
            }
        };

        Router::new()
            .route("/lorem", get(counted(Arc::clone(&calls))))
            .route("/form", post(counted(Arc::clone(&calls))))
            .route(
                "/slow",
                get({
                    let calls = Arc::clone(&calls);
                    move || {
                        let calls = Arc::clone(&calls);
                        async move {
                            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                            let n = calls.fetch_add(1, Ordering::SeqCst);
                            format!("slow #{}", n)
                        }
                    }
                }),
            )
            .route(
                "/teapot",
                get(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") }),
            )
            .route(
                "/cookie",
                get(|| async { ([(header::SET_COOKIE, "a=b")], "with cookie") }),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                cache,
                cache_middleware,
            ))
    }

    async fn call(app: &Router, method: Method, uri: &str) -> Response {
        app.clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn cache() -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(&CacheConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache(), Arc::clone(&calls));

        let first = call(&app, Method::GET, "/lorem").await;
        assert!(first.headers().get(header::EXPIRES).is_none());
        assert_eq!(text(first).await, "render #0");

        let second = call(&app, Method::GET, "/lorem").await;
        assert!(second.headers().get(header::EXPIRES).is_some());
        assert_eq!(text(second).await, "render #0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_recomputes_and_overwrites() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache(), Arc::clone(&calls));

        call(&app, Method::GET, "/lorem").await;
        let refreshed = call(&app, Method::GET, "/lorem?opn").await;
        assert!(refreshed.headers().get(header::EXPIRES).is_none());
        assert_eq!(text(refreshed).await, "render #1");

        let after = call(&app, Method::GET, "/lorem").await;
        assert_eq!(text(after).await, "render #1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_get_requests_pass_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache(), Arc::clone(&calls));

        call(&app, Method::POST, "/form").await;
        call(&app, Method::POST, "/form").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_and_cookies_are_not_stored() {
        let cache = cache();
        let app = app(Arc::clone(&cache), Arc::new(AtomicUsize::new(0)));

        call(&app, Method::GET, "/teapot").await;
        call(&app, Method::GET, "/cookie").await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn oversized_bodies_are_not_stored() {
        let cache = Arc::new(
            ResponseCache::new(&CacheConfig {
                max_body_bytes: 4,
                ..CacheConfig::default()
            })
            .unwrap(),
        );
        let app = app(Arc::clone(&cache), Arc::new(AtomicUsize::new(0)));

        let response = call(&app, Method::GET, "/lorem").await;
        assert_eq!(text(response).await, "render #0");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_misses_compute_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = app(cache(), Arc::clone(&calls));

        let responses = futures_util::future::join_all(
            (0..5).map(|_| call(&app, Method::GET, "/slow")),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for response in responses {
            assert_eq!(text(response).await, "slow #0");
        }
    }
}
