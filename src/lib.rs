//! d2s: server-rendered web front end.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id → tracing → metrics → logging → timeout
//!                       → recovery → identity → [response cache] → handler
//!                                                                     │
//!     Client Response                                                 ▼
//!     ◀────────────── Set-Cookie / Expires ◀──────── RequestContext::render
//!
//!     Cross-cutting: config · session · auth · observability · lifecycle
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;

// Request state
pub mod auth;
pub mod cache;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

// Routes
pub mod app;

pub use config::AppConfig;
pub use error::{ErrorHandler, HttpError};
pub use http::{HttpServer, RequestContext};
pub use lifecycle::Shutdown;
