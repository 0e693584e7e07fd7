//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply CLI overrides → Validate → Build server → Bind
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → /ready answers 503 → Stop accepting → Drain (bounded) → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then the server
//! - Shutdown has a deadline: in-flight requests are abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{ConfigOverrides, StartupError};
