//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define the service metrics once, against both metric providers
//! - Record every measurement to the push provider AND the pull provider
//!
//! # Metrics
//! - `http.server.request.count` / `http_server_requests_total` (counter): by route, method, status
//! - `http.server.request.duration` / `http_server_request_duration_seconds` (histogram): latency
//! - `dice.rolls` / `dice_rolls_total` (counter): by rolled value
//!
//! # Design Decisions
//! - Two metric providers coexist; neither shadows the other
//! - Prometheus names carry the configured namespace prefix

use std::time::Duration;

use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;

use crate::observability::providers::PrometheusProvider;

pub const INSTRUMENTATION_SCOPE: &str = "rolldice-otel";

/// Request and business instruments, multiplexed to both metric providers.
#[derive(Clone)]
pub struct ServiceMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    rolls: Counter<u64>,
    prometheus: PrometheusProvider,
    requests_name: String,
    duration_name: String,
    rolls_name: String,
}

impl ServiceMetrics {
    pub fn new(meter_provider: &SdkMeterProvider, prometheus: PrometheusProvider) -> Self {
        let meter = meter_provider.meter(INSTRUMENTATION_SCOPE);

        let requests = meter
            .u64_counter("http.server.request.count")
            .with_description("Number of HTTP requests served")
            .build();
        let duration = meter
            .f64_histogram("http.server.request.duration")
            .with_description("Duration of HTTP requests")
            .with_unit("s")
            .build();
        let rolls = meter
            .u64_counter("dice.rolls")
            .with_description("Number of dice rolls by value")
            .build();

        Self {
            requests,
            duration,
            rolls,
            requests_name: prometheus.metric_name("http_server_requests_total"),
            duration_name: prometheus.metric_name("http_server_request_duration_seconds"),
            rolls_name: prometheus.metric_name("dice_rolls_total"),
            prometheus,
        }
    }

    pub fn record_request(&self, route: &str, method: &str, status: u16, elapsed: Duration) {
        let attributes = [
            KeyValue::new("http.route", route.to_string()),
            KeyValue::new("http.request.method", method.to_string()),
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        self.requests.add(1, &attributes);
        self.duration.record(elapsed.as_secs_f64(), &attributes);

        self.prometheus.record(|| {
            let labels = [
                ("route", route.to_string()),
                ("method", method.to_string()),
                ("status", status.to_string()),
            ];
            metrics::counter!(self.requests_name.clone(), &labels).increment(1);
            metrics::histogram!(self.duration_name.clone(), &labels).record(elapsed.as_secs_f64());
        });
    }

    pub fn record_roll(&self, value: u8) {
        self.rolls
            .add(1, &[KeyValue::new("roll.value", i64::from(value))]);

        self.prometheus.record(|| {
            metrics::counter!(self.rolls_name.clone(), "roll_value" => value.to_string())
                .increment(1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lands_in_prometheus_exposition() {
        let meter_provider = SdkMeterProvider::builder().build();
        let prometheus = PrometheusProvider::new("dice_game").unwrap();
        let metrics = ServiceMetrics::new(&meter_provider, prometheus.clone());

        metrics.record_request("/rolldice", "GET", 200, Duration::from_millis(3));
        metrics.record_roll(4);

        let rendered = prometheus.render();
        let line = rendered
            .lines()
            .find(|l| l.starts_with("dice_game_http_server_requests_total{"))
            .expect("request counter exposed");
        assert!(line.contains(r#"route="/rolldice""#), "{line}");
        assert!(line.contains(r#"status="200""#), "{line}");
        assert!(line.ends_with(" 1"), "{line}");
        assert!(rendered.contains(r#"dice_game_dice_rolls_total{roll_value="4"} 1"#));
    }
}
