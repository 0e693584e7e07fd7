//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml::Table;

use crate::config::schema::AppConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path}: failed reading: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {path}: failed parsing: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of reading the config layers.
#[derive(Debug)]
pub struct LayeredConfig {
    pub config: AppConfig,
    /// Paths that did not exist. Reported by the caller once logging is up.
    pub skipped: Vec<PathBuf>,
}

/// Load configuration from a list of TOML files without validating it.
///
/// Files are applied in order; keys in later files override earlier ones,
/// tables are merged key by key. Missing files are skipped.
pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<LayeredConfig, ConfigError> {
    let mut merged = Table::new();
    let mut skipped = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                skipped.push(path.to_path_buf());
                continue;
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let layer: Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Config file read");
        merge(&mut merged, layer);
    }

    let config: AppConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|source| ConfigError::Parse {
            path: paths
                .last()
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_default(),
            source,
        })?;
    Ok(LayeredConfig { config, skipped })
}

fn merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
