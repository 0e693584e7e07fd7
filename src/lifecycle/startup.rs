//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration layers and apply command-line overrides
//! - Validate before anything else is initialized
//! - Collect every startup failure into one error type for `main`
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::path::PathBuf;
use thiserror::Error;

use crate::auth::{ProviderConfigError, ProviderError};
use crate::cache::CacheError;
use crate::config::{load_layered, validate_config, AppConfig, ConfigError, LayeredConfig};
use crate::observability::logging::LoggingError;
use crate::session::KeyError;

/// Anything that prevents the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid session secret: {0}")]
    SessionKey(#[from] KeyError),

    #[error("invalid cache settings: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    ProviderConfig(#[from] ProviderConfigError),

    #[error("failed to build oauth client: {0}")]
    Provider(#[from] ProviderError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Values given on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub dev: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if self.dev {
            config.dev = true;
        }
        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Read the config files, apply overrides and validate the result.
///
/// Runs before logging is initialized, so skipped files are handed back
/// rather than logged here.
pub fn load_config(
    paths: &[PathBuf],
    overrides: &ConfigOverrides,
) -> Result<LayeredConfig, StartupError> {
    let mut layered = load_layered(paths)?;
    overrides.apply(&mut layered.config);
    validate_config(&layered.config).map_err(ConfigError::Validation)?;
    Ok(layered)
}
