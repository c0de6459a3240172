//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber before anything else runs
//! - Bridge `tracing` events into the OpenTelemetry log provider once it exists
//!
//! # Design Decisions
//! - Log level configurable via `RUST_LOG`
//! - The bridge sits behind a reload handle: startup logs emitted before the
//!   log provider is built still reach the console

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "rolldice_otel=info,tower_http=info,opentelemetry=off";

type Bridge = OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to attach log provider: {0}")]
    Attach(#[from] reload::Error),
}

/// Handle to the installed subscriber's log-provider slot.
pub struct LogBridge {
    handle: reload::Handle<Option<Bridge>, Registry>,
}

impl LogBridge {
    /// Start forwarding `tracing` events to `provider`.
    pub fn attach(&self, provider: &SdkLoggerProvider) -> Result<(), LoggingError> {
        self.handle
            .reload(Some(OpenTelemetryTracingBridge::new(provider)))?;
        Ok(())
    }

    /// Stop forwarding; events keep reaching the console.
    pub fn detach(&self) -> Result<(), LoggingError> {
        self.handle.reload(None)?;
        Ok(())
    }
}

/// Install the process-wide subscriber. Call once, first thing in `main`.
pub fn init() -> Result<LogBridge, LoggingError> {
    let (bridge, handle) = reload::Layer::new(None::<Bridge>);

    tracing_subscriber::registry()
        .with(bridge)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(LogBridge { handle })
}
