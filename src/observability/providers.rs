//! Telemetry provider construction.
//!
//! # Responsibilities
//! - Build one provider per telemetry kind from static configuration
//! - Pair every provider with the operation that shuts it down
//! - Report construction failures per kind, without touching global state
//!
//! # Providers
//! - trace: SDK tracer provider, batch span processor
//! - metric: SDK meter provider, periodic reader
//! - pull metric: Prometheus recorder rendered on scrape
//! - log: SDK logger provider, batch log processor

use std::fmt;
use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use opentelemetry::KeyValue;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{
    BatchConfigBuilder as LogBatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider,
};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder as TraceBatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider,
};
use opentelemetry_sdk::Resource;
use opentelemetry_otlp::WithExportConfig;
use thiserror::Error;

use crate::config::{ExporterConfig, LogsConfig, TelemetryConfig, TracesConfig};
use crate::lifecycle::shutdown::ShutdownOp;

/// The telemetry providers the service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Trace,
    Metric,
    PullMetric,
    Log,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Trace => "trace provider",
            ProviderKind::Metric => "metric provider",
            ProviderKind::PullMetric => "pull metric provider",
            ProviderKind::Log => "log provider",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction failure of one provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build {provider} exporter: {source}")]
    Exporter {
        provider: ProviderKind,
        #[source]
        source: opentelemetry_otlp::ExporterBuildError,
    },

    #[error("invalid {provider} configuration: {reason}")]
    InvalidConfig {
        provider: ProviderKind,
        reason: String,
    },

    /// The exporter was built but its destination refused it. Not raised by
    /// [`SdkProviderFactory`], whose exporters connect lazily; factories that
    /// check their sink at build time report it here.
    #[error("{provider} export sink unavailable: {reason}")]
    SinkUnavailable {
        provider: ProviderKind,
        reason: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderError::Exporter { provider, .. }
            | ProviderError::InvalidConfig { provider, .. }
            | ProviderError::SinkUnavailable { provider, .. } => *provider,
        }
    }
}

/// A ready provider and the operation that shuts it down.
pub struct Built<P> {
    pub provider: P,
    pub shutdown: ShutdownOp,
}

impl<P> Built<P> {
    pub fn new(provider: P, shutdown: ShutdownOp) -> Self {
        Self { provider, shutdown }
    }
}

/// Builds each provider independently.
///
/// A failing call must release whatever it acquired itself; the caller
/// rolls back providers built by earlier calls.
pub trait ProviderFactory {
    fn tracer_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkTracerProvider>, ProviderError>;

    fn meter_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkMeterProvider>, ProviderError>;

    fn pull_meter_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<PrometheusProvider>, ProviderError>;

    fn logger_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkLoggerProvider>, ProviderError>;
}

/// Shutdown for an SDK provider: the SDK call blocks while it flushes.
pub fn sdk_shutdown<F>(kind: ProviderKind, f: F) -> ShutdownOp
where
    F: FnOnce() -> OTelSdkResult + Send + 'static,
{
    ShutdownOp::blocking(kind.as_str(), move || f().map_err(|e| e.to_string()))
}

/// Pull-based metric provider backed by a Prometheus recorder.
///
/// The recorder is never installed as the global `metrics` recorder; callers
/// record through [`PrometheusProvider::record`].
#[derive(Clone)]
pub struct PrometheusProvider {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
    namespace: String,
}

impl PrometheusProvider {
    pub fn new(namespace: &str) -> Result<Self, ProviderError> {
        if !is_valid_namespace(namespace) {
            return Err(ProviderError::InvalidConfig {
                provider: ProviderKind::PullMetric,
                reason: format!("`{namespace}` is not a valid Prometheus namespace"),
            });
        }

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
            namespace: namespace.to_string(),
        })
    }

    /// Fully qualified exposition name for `name`.
    pub fn metric_name(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", self.namespace, name)
        }
    }

    /// Run `f` with this provider as the active `metrics` recorder.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(self.recorder.as_ref(), f)
    }

    /// Text exposition format, as served to the scraper.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl fmt::Debug for PrometheusProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusProvider")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn is_valid_namespace(namespace: &str) -> bool {
    let mut chars = namespace.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => false,
    }
}

/// Production factory: OpenTelemetry SDK providers with stdout or OTLP export.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkProviderFactory;

impl ProviderFactory for SdkProviderFactory {
    fn tracer_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkTracerProvider>, ProviderError> {
        let kind = ProviderKind::Trace;
        let signal = &config.traces;
        let builder = SdkTracerProvider::builder().with_resource(build_resource(config));

        let builder = match &signal.exporter {
            ExporterConfig::Stdout => builder.with_span_processor(
                BatchSpanProcessor::builder(opentelemetry_stdout::SpanExporter::default())
                    .with_batch_config(span_batch_config(signal))
                    .build(),
            ),
            ExporterConfig::Otlp { endpoint } => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint)
                    .build()
                    .map_err(|source| ProviderError::Exporter {
                        provider: kind,
                        source,
                    })?;
                builder.with_span_processor(
                    BatchSpanProcessor::builder(exporter)
                        .with_batch_config(span_batch_config(signal))
                        .build(),
                )
            }
            ExporterConfig::None => builder,
        };

        let provider = builder.build();
        let shutdown = sdk_shutdown(kind, {
            let provider = provider.clone();
            move || provider.shutdown()
        });
        Ok(Built::new(provider, shutdown))
    }

    fn meter_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkMeterProvider>, ProviderError> {
        let kind = ProviderKind::Metric;
        let signal = &config.metrics;
        let builder = SdkMeterProvider::builder().with_resource(build_resource(config));

        let builder = match &signal.exporter {
            ExporterConfig::Stdout => builder.with_reader(
                PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default())
                    .with_interval(signal.interval())
                    .build(),
            ),
            ExporterConfig::Otlp { endpoint } => {
                let exporter = opentelemetry_otlp::MetricExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint)
                    .build()
                    .map_err(|source| ProviderError::Exporter {
                        provider: kind,
                        source,
                    })?;
                builder.with_reader(
                    PeriodicReader::builder(exporter)
                        .with_interval(signal.interval())
                        .build(),
                )
            }
            ExporterConfig::None => builder,
        };

        let provider = builder.build();
        let shutdown = sdk_shutdown(kind, {
            let provider = provider.clone();
            move || provider.shutdown()
        });
        Ok(Built::new(provider, shutdown))
    }

    fn pull_meter_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<PrometheusProvider>, ProviderError> {
        let provider = PrometheusProvider::new(&config.prometheus.namespace)?;
        tracing::info!(
            namespace = %config.prometheus.namespace,
            path = %config.prometheus.path,
            "Prometheus meter provider initialized"
        );

        let shutdown = ShutdownOp::new(ProviderKind::PullMetric.as_str(), {
            let provider = provider.clone();
            move |_| async move {
                provider.upkeep();
                Ok(())
            }
        });
        Ok(Built::new(provider, shutdown))
    }

    fn logger_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<SdkLoggerProvider>, ProviderError> {
        let kind = ProviderKind::Log;
        let signal = &config.logs;
        let builder = SdkLoggerProvider::builder().with_resource(build_resource(config));

        let builder = match &signal.exporter {
            ExporterConfig::Stdout => builder.with_log_processor(
                BatchLogProcessor::builder(opentelemetry_stdout::LogExporter::default())
                    .with_batch_config(log_batch_config(signal))
                    .build(),
            ),
            ExporterConfig::Otlp { endpoint } => {
                let exporter = opentelemetry_otlp::LogExporter::builder()
                    .with_tonic()
                    .with_endpoint(endpoint)
                    .build()
                    .map_err(|source| ProviderError::Exporter {
                        provider: kind,
                        source,
                    })?;
                builder.with_log_processor(
                    BatchLogProcessor::builder(exporter)
                        .with_batch_config(log_batch_config(signal))
                        .build(),
                )
            }
            ExporterConfig::None => builder,
        };

        let provider = builder.build();
        let shutdown = sdk_shutdown(kind, {
            let provider = provider.clone();
            move || provider.shutdown()
        });
        Ok(Built::new(provider, shutdown))
    }
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_attributes([KeyValue::new("service.name", config.service_name.clone())])
        .build()
}

fn span_batch_config(signal: &TracesConfig) -> opentelemetry_sdk::trace::BatchConfig {
    TraceBatchConfigBuilder::default()
        .with_scheduled_delay(signal.interval())
        .build()
}

fn log_batch_config(signal: &LogsConfig) -> opentelemetry_sdk::logs::BatchConfig {
    LogBatchConfigBuilder::default()
        .with_scheduled_delay(signal.interval())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> TelemetryConfig {
        let mut config = TelemetryConfig::default();
        config.traces.exporter = ExporterConfig::None;
        config.metrics.exporter = ExporterConfig::None;
        config.logs.exporter = ExporterConfig::None;
        config
    }

    #[test]
    fn test_namespace_validation() {
        assert!(is_valid_namespace("dice_game"));
        assert!(is_valid_namespace(""));
        assert!(is_valid_namespace("_x1"));
        assert!(!is_valid_namespace("1dice"));
        assert!(!is_valid_namespace("dice-game"));
    }

    #[test]
    fn test_invalid_namespace_fails_pull_provider() {
        let mut config = quiet_config();
        config.prometheus.namespace = "dice game".into();

        let err = SdkProviderFactory
            .pull_meter_provider(&config)
            .err()
            .unwrap();
        assert_eq!(err.provider(), ProviderKind::PullMetric);
    }

    #[test]
    fn test_prometheus_records_through_local_recorder() {
        let provider = PrometheusProvider::new("dice_game").unwrap();
        let name = provider.metric_name("sample_total");
        provider.record(|| metrics::counter!(name.clone()).increment(2));

        let rendered = provider.render();
        assert!(rendered.contains("dice_game_sample_total 2"), "{rendered}");
    }

    #[tokio::test]
    async fn test_invalid_otlp_endpoint_fails_synchronously() {
        let mut config = quiet_config();
        config.traces.exporter = ExporterConfig::Otlp {
            endpoint: "not a uri".into(),
        };

        let err = SdkProviderFactory.tracer_provider(&config).err().unwrap();
        assert_eq!(err.provider(), ProviderKind::Trace);
        assert!(matches!(err, ProviderError::Exporter { .. }));
    }

    #[tokio::test]
    async fn test_sdk_providers_shut_down_cleanly() {
        // Stdout exporters, so every provider has a processor or reader to flush.
        let config = TelemetryConfig::default();
        let factory = SdkProviderFactory;

        let mut registry = crate::lifecycle::shutdown::ShutdownRegistry::new();
        registry.register(factory.tracer_provider(&config).unwrap().shutdown);
        registry.register(factory.meter_provider(&config).unwrap().shutdown);
        registry.register(factory.pull_meter_provider(&config).unwrap().shutdown);
        registry.register(factory.logger_provider(&config).unwrap().shutdown);

        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        registry.drain(deadline).await.unwrap();
        assert!(registry.is_empty());
    }
}
