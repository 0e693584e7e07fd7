//! Application routes.
//!
//! # Routes
//! ```text
//! /               index (greeting or login link)
//! /lorem          cached content; fragment on Hx-Request
//! /auth/login     provider redirect, or bypass sign-in in dev mode
//! /auth/callback  provider return (absent in bypass mode)
//! /auth/logout    clear session
//! /panic /error   recovery boundary demos
//! /wait           slow response, for watching the shutdown drain
//! fallback        static assets from `public`, then 404
//! ```

pub mod auth;
pub mod pages;
pub mod views;

use axum::handler::HandlerWithoutStateExt;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::cache::layer::cache_middleware;
use crate::http::AppState;

pub use views::AppErrorHandler;

/// The application router with `state` applied.
pub fn routes(state: AppState) -> Router {
    let lorem = match &state.cache {
        Some(cache) => get(pages::lorem)
            .route_layer(from_fn_with_state(Arc::clone(cache), cache_middleware)),
        None => get(pages::lorem),
    };

    let mut router = Router::new()
        .route("/", get(pages::index))
        .route("/lorem", lorem)
        .route("/panic", get(pages::panic))
        .route("/error", get(pages::error))
        .route("/wait", get(pages::wait))
        .route("/auth/logout", get(auth::logout));

    router = if state.config.is_bypass_auth() {
        tracing::warn!("Bypass login enabled; /auth/login signs in without the provider");
        router.route("/auth/login", get(auth::login_bypass))
    } else {
        router
            .route("/auth/login", get(auth::login))
            .route("/auth/callback", get(auth::callback))
    };

    router = match &state.config.public {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(pages::not_found.into_service()),
        ),
        None => router.fallback(pages::not_found),
    };

    router.with_state(state)
}
