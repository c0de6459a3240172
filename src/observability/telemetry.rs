//! The telemetry context handed to request handling.

use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};

use crate::observability::metrics::{ServiceMetrics, INSTRUMENTATION_SCOPE};
use crate::observability::providers::PrometheusProvider;

/// Every provider the service runs, reachable by name.
///
/// Built once during startup and never mutated afterwards, so it is shared
/// through an `Arc` without locking. Both metric providers stay reachable;
/// [`ServiceMetrics`] records to each of them.
pub struct Telemetry {
    propagator: TextMapCompositePropagator,
    tracer_provider: SdkTracerProvider,
    tracer: SdkTracer,
    meter_provider: SdkMeterProvider,
    prometheus: PrometheusProvider,
    logger_provider: SdkLoggerProvider,
    metrics: ServiceMetrics,
}

impl Telemetry {
    pub fn new(
        propagator: TextMapCompositePropagator,
        tracer_provider: SdkTracerProvider,
        meter_provider: SdkMeterProvider,
        prometheus: PrometheusProvider,
        logger_provider: SdkLoggerProvider,
    ) -> Self {
        let tracer = tracer_provider.tracer(INSTRUMENTATION_SCOPE);
        let metrics = ServiceMetrics::new(&meter_provider, prometheus.clone());

        Self {
            propagator,
            tracer_provider,
            tracer,
            meter_provider,
            prometheus,
            logger_provider,
            metrics,
        }
    }

    pub fn propagator(&self) -> &TextMapCompositePropagator {
        &self.propagator
    }

    pub fn tracer_provider(&self) -> &SdkTracerProvider {
        &self.tracer_provider
    }

    pub fn tracer(&self) -> &SdkTracer {
        &self.tracer
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    pub fn prometheus(&self) -> &PrometheusProvider {
        &self.prometheus
    }

    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.logger_provider
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }
}
