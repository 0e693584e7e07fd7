//! HTTP request processing subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, route table, graceful shutdown)
//!     → pipeline.rs (request id → tracing → metrics → logging → timeout
//!                    → recovery → identity)
//!     → context.rs (RequestContext extracted by the handler)
//!     → render.rs (components written into the response body)
//!     → Send to client
//! ```

pub mod context;
pub mod health;
pub mod middleware;
pub mod pipeline;
pub mod render;
pub mod server;

use axum::http::HeaderName;

pub use context::{CookieError, RequestContext, ResponseError, SpanHandle};
pub use pipeline::{Pipeline, PipelineDeps, Stage};
pub use render::Component;
pub use server::{AppState, HttpServer, HttpServerBuilder};

/// Correlation header set on every request and echoed on the response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Present when the client wants a fragment instead of a full page.
pub const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
