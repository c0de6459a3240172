//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the composite propagator
//! - Build every telemetry provider in a fixed order
//! - Register each provider's shutdown as soon as it exists
//! - Roll back everything already built when a later provider fails
//!
//! # State Machine
//! ```text
//! Init → PropagatorSet → TraceReady → MetricReady → PullMetricReady → LogReady → Running
//!                           ↓             ↓               ↓              ↓
//!                         Failed ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ← ←
//! ```
//!
//! # Design Decisions
//! - Fail fast: any provider failure is fatal, there is no degraded mode
//! - Providers initialize in order, not concurrently
//! - Global OpenTelemetry slots are optional mirrors of the explicit context

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::TelemetryConfig;
use crate::lifecycle::shutdown::{ShutdownErrors, ShutdownRegistry};
use crate::observability::propagation::composite_propagator;
use crate::observability::providers::{Built, ProviderError, ProviderFactory};
use crate::observability::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Init,
    PropagatorSet,
    TraceReady,
    MetricReady,
    PullMetricReady,
    LogReady,
    Running,
    Failed,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupPhase::Init => "init",
            StartupPhase::PropagatorSet => "propagator_set",
            StartupPhase::TraceReady => "trace_ready",
            StartupPhase::MetricReady => "metric_ready",
            StartupPhase::PullMetricReady => "pull_metric_ready",
            StartupPhase::LogReady => "log_ready",
            StartupPhase::Running => "running",
            StartupPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A provider failed to build. Carries the rollback outcome as well.
#[derive(Debug, Error)]
pub struct StartupError {
    #[source]
    cause: ProviderError,
    rollback: Option<ShutdownErrors>,
}

impl StartupError {
    pub fn cause(&self) -> &ProviderError {
        &self.cause
    }

    /// Failures of providers torn down during rollback, if any.
    pub fn rollback(&self) -> Option<&ShutdownErrors> {
        self.rollback.as_ref()
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "telemetry startup failed: {}", self.cause)?;
        if let Some(rollback) = &self.rollback {
            write!(f, "\n{rollback}")?;
        }
        Ok(())
    }
}

/// Running telemetry plus the obligation to shut it down.
pub struct TelemetryPipeline {
    telemetry: Arc<Telemetry>,
    registry: ShutdownRegistry,
    drain_timeout: Duration,
}

impl TelemetryPipeline {
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Shutdown operations not yet drained.
    pub fn pending_shutdowns(&self) -> usize {
        self.registry.len()
    }

    /// Shut down every provider, oldest first. Later calls are no-ops.
    pub async fn shutdown(&mut self) -> Result<(), ShutdownErrors> {
        let deadline = Instant::now() + self.drain_timeout;
        self.registry.drain(deadline).await
    }
}

/// Build the telemetry pipeline, or tear down whatever was built and fail.
pub async fn bootstrap<F>(
    config: &TelemetryConfig,
    factory: &F,
) -> Result<TelemetryPipeline, StartupError>
where
    F: ProviderFactory + ?Sized,
{
    enter(StartupPhase::Init);
    let mut registry = ShutdownRegistry::new();

    match build(config, factory, &mut registry) {
        Ok(telemetry) => {
            enter(StartupPhase::Running);
            Ok(TelemetryPipeline {
                telemetry: Arc::new(telemetry),
                registry,
                drain_timeout: config.drain_timeout(),
            })
        }
        Err(cause) => {
            tracing::error!(
                phase = %StartupPhase::Failed,
                provider = %cause.provider(),
                error = %cause,
                rollback = registry.len(),
                "Telemetry startup failed, shutting down providers already built"
            );
            let rollback = registry
                .drain(Instant::now() + config.drain_timeout())
                .await
                .err();
            Err(StartupError { cause, rollback })
        }
    }
}

fn build<F>(
    config: &TelemetryConfig,
    factory: &F,
    registry: &mut ShutdownRegistry,
) -> Result<Telemetry, ProviderError>
where
    F: ProviderFactory + ?Sized,
{
    let propagator = composite_propagator();
    if config.install_globals {
        global::set_text_map_propagator(composite_propagator());
    }
    enter(StartupPhase::PropagatorSet);

    let tracer_provider = admit(registry, factory.tracer_provider(config))?;
    if config.install_globals {
        global::set_tracer_provider(tracer_provider.clone());
    }
    enter(StartupPhase::TraceReady);

    let meter_provider = admit(registry, factory.meter_provider(config))?;
    if config.install_globals {
        global::set_meter_provider(meter_provider.clone());
    }
    enter(StartupPhase::MetricReady);

    let prometheus = admit(registry, factory.pull_meter_provider(config))?;
    enter(StartupPhase::PullMetricReady);

    let logger_provider = admit(registry, factory.logger_provider(config))?;
    enter(StartupPhase::LogReady);

    Ok(Telemetry::new(
        propagator,
        tracer_provider,
        meter_provider,
        prometheus,
        logger_provider,
    ))
}

fn admit<P>(
    registry: &mut ShutdownRegistry,
    built: Result<Built<P>, ProviderError>,
) -> Result<P, ProviderError> {
    let Built { provider, shutdown } = built?;
    registry.register(shutdown);
    Ok(provider)
}

fn enter(phase: StartupPhase) {
    tracing::debug!(%phase, "Startup phase");
}
