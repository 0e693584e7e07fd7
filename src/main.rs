use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

use d2s::lifecycle::{signals, startup, ConfigOverrides, StartupError};
use d2s::observability::{logging, metrics};
use d2s::{HttpServer, Shutdown};

/// Start the service.
#[derive(Debug, Parser)]
#[command(name = "d2s", version, about)]
struct Cli {
    /// Configuration file; repeat to layer several, later ones win.
    #[arg(short, long = "config", default_value = "d2s.toml")]
    config: Vec<PathBuf>,

    /// Development mode: verbose logs, bypass login allowed.
    #[arg(long, env = "DEV")]
    dev: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long = "log-level", env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("d2s: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let overrides = ConfigOverrides {
        dev: cli.dev,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
    };
    let layered = startup::load_config(&cli.config, &overrides)?;
    let config = layered.config;

    let _logging = logging::init_logging(&config.observability, &config.tracer, config.dev)?;
    for path in &layered.skipped {
        tracing::warn!(path = %path.display(), "Config file not found, skipping");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "d2s starting");
    tracing::debug!(?config, "dumping config");

    if config.observability.metrics_enabled {
        metrics::init_metrics();
    }

    let address = config.listener.bind_address();
    let server = HttpServer::builder(config).build()?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %address, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::listen(shutdown.clone());

    if let Err(e) = server.run(listener, &shutdown).await {
        tracing::error!(error = %e, "Server terminated with an error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
