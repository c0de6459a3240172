//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Telemetry pipeline settings.
    pub telemetry: TelemetryConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound for receiving a request body, in milliseconds.
    pub read_timeout_ms: u64,

    /// Upper bound for producing a full response, in milliseconds.
    pub write_timeout_ms: u64,

    /// How long in-flight requests may run after an interrupt, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            read_timeout_ms: 1_000,
            write_timeout_ms: 10_000,
            shutdown_grace_ms: 15_000,
        }
    }
}

/// Telemetry pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Value of the `service.name` resource attribute.
    pub service_name: String,

    /// Also publish the propagator and providers to the
    /// `opentelemetry::global` slots for third-party instrumentation.
    pub install_globals: bool,

    /// Deadline shared by every provider shutdown, in milliseconds.
    pub drain_timeout_ms: u64,

    /// Span export (batched).
    pub traces: TracesConfig,

    /// Push-based metric export (periodic reader).
    pub metrics: MetricsConfig,

    /// Log record export (batched).
    pub logs: LogsConfig,

    /// Pull-based metric exposition.
    pub prometheus: PrometheusConfig,
}

impl TelemetryConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "rolldice".to_string(),
            install_globals: true,
            drain_timeout_ms: 5_000,
            traces: TracesConfig::default(),
            metrics: MetricsConfig::default(),
            logs: LogsConfig::default(),
            prometheus: PrometheusConfig::default(),
        }
    }
}

/// Span batch delay of 1 s.
pub type TracesConfig = SignalConfig<1_000>;

/// Metric collection interval of 3 s.
pub type MetricsConfig = SignalConfig<3_000>;

/// Log batch delay of 1 s.
pub type LogsConfig = SignalConfig<1_000>;

/// Export settings for one push signal.
///
/// `DEFAULT_MS` fills `interval_ms` whenever it is absent, including from a
/// table that sets only the exporter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, bound(deserialize = ""))]
pub struct SignalConfig<const DEFAULT_MS: u64> {
    /// Where the signal is exported.
    pub exporter: ExporterConfig,

    /// Batch delay (traces, logs) or collection interval (metrics), in milliseconds.
    pub interval_ms: u64,
}

impl<const DEFAULT_MS: u64> SignalConfig<DEFAULT_MS> {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl<const DEFAULT_MS: u64> Default for SignalConfig<DEFAULT_MS> {
    fn default() -> Self {
        Self {
            exporter: ExporterConfig::Stdout,
            interval_ms: DEFAULT_MS,
        }
    }
}

/// Export sink for a push signal.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExporterConfig {
    /// Pretty-printed to standard output.
    #[default]
    Stdout,

    /// OTLP over gRPC to a collector.
    Otlp { endpoint: String },

    /// Provider is built without an exporter; data is dropped.
    None,
}

/// Pull-based metric exposition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Prefix prepended to every exposed metric name.
    pub namespace: String,

    /// HTTP path served to the scraper.
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            namespace: "dice_game".to_string(),
            path: "/metrics".to_string(),
        }
    }
}
