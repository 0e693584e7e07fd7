//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware stages and subsystems produce:
//!     → logging.rs (structured log events, request-scoped spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (JSON or human-readable)
//!     → GET /metrics (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows into every log line through the request span
//! - Metrics are cheap (atomic increments) and no-ops until initialized

pub mod logging;
pub mod metrics;
