//! Structured logging and trace export.
//!
//! # Responsibilities
//! - Initialize the global subscriber once at startup
//! - Pick the output format and level from configuration
//! - Export spans over OTLP/HTTP when `[tracer]` is enabled
//!
//! # Design Decisions
//! - JSON lines in production, human-readable output in dev mode
//! - `RUST_LOG` overrides the configured level; dev mode forces `trace`
//! - The exporter batches on its own thread; [`LoggingGuard`] flushes it on drop

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::collections::HashMap;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ObservabilityConfig, TracerConfig};

/// Service name reported to the collector.
const SERVICE_NAME: &str = "d2s";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    Subscriber(#[from] TryInitError),

    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),
}

/// Keeps the trace exporter alive; pending spans are flushed on drop.
#[must_use = "dropping the guard shuts down trace export"]
pub struct LoggingGuard {
    tracer: Option<SdkTracerProvider>,
}

impl LoggingGuard {
    pub fn is_exporting(&self) -> bool {
        self.tracer.is_some()
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer.take() {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Failed to flush traces");
            }
        }
    }
}

/// Level directive used when `RUST_LOG` is not set.
pub fn effective_level(config: &ObservabilityConfig, dev: bool) -> &str {
    if dev {
        "trace"
    } else {
        &config.log_level
    }
}

/// Build the OTLP tracer provider, or `None` when export is disabled.
pub fn tracer_provider(config: &TracerConfig) -> Result<Option<SdkTracerProvider>, LoggingError> {
    if !config.enabled {
        return Ok(None);
    }

    let headers: HashMap<String, String> = config
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.as_str())
        .with_headers(headers)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build();
    Ok(Some(provider))
}

/// Install the global subscriber.
pub fn init_logging(
    config: &ObservabilityConfig,
    tracer: &TracerConfig,
    dev: bool,
) -> Result<LoggingGuard, LoggingError> {
    let level = effective_level(config, dev);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let provider = tracer_provider(tracer)?;
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer(SERVICE_NAME)));

    let registry = tracing_subscriber::registry().with(filter).with(otel);
    if config.json && !dev {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()?;
    }

    if provider.is_some() {
        tracing::info!(endpoint = %tracer.endpoint, "Exporting traces over OTLP");
    }
    Ok(LoggingGuard { tracer: provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_forces_trace() {
        let config = ObservabilityConfig {
            log_level: "warn".into(),
            ..ObservabilityConfig::default()
        };
        assert_eq!(effective_level(&config, false), "warn");
        assert_eq!(effective_level(&config, true), "trace");
    }

    #[test]
    fn tracer_disabled_builds_nothing() {
        assert!(tracer_provider(&TracerConfig::default()).unwrap().is_none());
    }

    #[test]
    fn tracer_enabled_builds_a_provider() {
        let mut config = TracerConfig {
            enabled: true,
            ..TracerConfig::default()
        };
        config
            .headers
            .insert("authorization".into(), "Bearer key".into());

        let provider = tracer_provider(&config).unwrap();
        let guard = LoggingGuard { tracer: provider };
        assert!(guard.is_exporting());
    }
}
