//! Request interceptors composed by the pipeline.

pub mod identity;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod timeout;

pub use identity::identity_middleware;
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use recovery::recovery_middleware;
pub use timeout::timeout_middleware;
