//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config files (TOML, repeatable --config)
//!     → loader.rs (read, merge layers, deserialize)
//!     → CLI flags override file values (lifecycle/startup.rs)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed by value to the server builder
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no global config singleton
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_layered, ConfigError, LayeredConfig};
pub use schema::{
    AppConfig, CacheConfig, ListenerConfig, OAuthSettings, ObservabilityConfig, SessionConfig,
    TimeoutConfig, TracerConfig,
};
pub use validation::{validate_config, ValidationError};
