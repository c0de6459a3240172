//! Dice-rolling HTTP service with OpenTelemetry traces, metrics and logs.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────┐
//!                  │                     ROLLDICE-OTEL                      │
//!                  │                                                        │
//!   SIGINT ────────┼─▶ lifecycle::signals ──cancel──┐                       │
//!                  │                                ▼                       │
//!                  │  lifecycle::startup      lifecycle::runner              │
//!                  │  ┌─────────────────┐     ┌───────────────────┐          │
//!                  │  │ propagator      │     │ listener task     │◀─────────┼── HTTP
//!                  │  │ trace provider  │────▶│ select! (error |  │          │
//!                  │  │ metric provider │     │         interrupt)│          │
//!                  │  │ pull provider   │     └─────────┬─────────┘          │
//!                  │  │ log provider    │               │ on every exit      │
//!                  │  └────────┬────────┘               ▼                    │
//!                  │           └──register──▶ lifecycle::shutdown (drain)    │
//!                  └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rolldice_otel::config::{load_config, validate_config, ConfigError, ServiceConfig};
use rolldice_otel::http::build_router;
use rolldice_otel::lifecycle::{bootstrap, Interrupt, ServiceRunner};
use rolldice_otel::observability::logging::{self, LogBridge};
use rolldice_otel::observability::SdkProviderFactory;

#[derive(Parser, Debug)]
#[command(name = "rolldice-otel", version, about = "Dice-rolling service with OpenTelemetry")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let bridge = match logging::init() {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("rolldice-otel: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(Cli::parse(), &bridge).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "rolldice-otel exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, bridge: &LogBridge) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("rolldice-otel v{} starting", env!("CARGO_PKG_VERSION"));

    let interrupt = Interrupt::os();
    let config = resolve_config(&cli)?;

    tracing::info!(
        bind_address = %config.server.bind_address,
        service_name = %config.telemetry.service_name,
        scrape_path = %config.telemetry.prometheus.path,
        "Configuration loaded"
    );

    let pipeline = bootstrap(&config.telemetry, &SdkProviderFactory).await?;
    let telemetry = pipeline.telemetry();

    if let Err(e) = bridge.attach(telemetry.logger_provider()) {
        tracing::warn!(error = %e, "Log records will not be exported");
    }

    let router = build_router(&config, telemetry);
    let result = ServiceRunner::new(config.server, router, interrupt)
        .run(pipeline)
        .await;

    // The log provider is shut down by now.
    if let Err(e) = bridge.detach() {
        tracing::warn!(error = %e, "Failed to detach log provider");
    }

    result?;
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
