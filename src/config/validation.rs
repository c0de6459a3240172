//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Detect a scrape path that collides with the business routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ExporterConfig, ServiceConfig};
use crate::http::ROLLDICE_PATH;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0}.exporter endpoint must not be empty")]
    EmptyEndpoint(&'static str),

    #[error("telemetry.prometheus.path `{0}` must start with '/'")]
    ScrapePath(String),

    #[error("telemetry.prometheus.path `{0}` must be a literal route without parameters, wildcards or empty segments")]
    ScrapeRoute(String),

    #[error("telemetry.prometheus.path `{0}` collides with the business route")]
    ScrapeCollision(String),
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }

    let durations = [
        ("server.read_timeout_ms", config.server.read_timeout_ms),
        ("server.write_timeout_ms", config.server.write_timeout_ms),
        ("server.shutdown_grace_ms", config.server.shutdown_grace_ms),
        ("telemetry.drain_timeout_ms", config.telemetry.drain_timeout_ms),
        ("telemetry.traces.interval_ms", config.telemetry.traces.interval_ms),
        ("telemetry.metrics.interval_ms", config.telemetry.metrics.interval_ms),
        ("telemetry.logs.interval_ms", config.telemetry.logs.interval_ms),
    ];
    for (name, value) in durations {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    let signals = [
        ("telemetry.traces", &config.telemetry.traces.exporter),
        ("telemetry.metrics", &config.telemetry.metrics.exporter),
        ("telemetry.logs", &config.telemetry.logs.exporter),
    ];
    for (name, exporter) in signals {
        if let ExporterConfig::Otlp { endpoint } = exporter {
            if endpoint.trim().is_empty() {
                errors.push(ValidationError::EmptyEndpoint(name));
            }
        }
    }

    let path = &config.telemetry.prometheus.path;
    if !path.starts_with('/') {
        errors.push(ValidationError::ScrapePath(path.clone()));
    } else if !is_literal_route(path) {
        errors.push(ValidationError::ScrapeRoute(path.clone()));
    } else if path.trim_end_matches('/') == ROLLDICE_PATH
        || path.starts_with(&format!("{ROLLDICE_PATH}/"))
    {
        errors.push(ValidationError::ScrapeCollision(path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A route the router accepts as a plain static path.
fn is_literal_route(path: &str) -> bool {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let last = segments.len() - 1;

    segments.iter().enumerate().all(|(i, segment)| {
        (i == last || !segment.is_empty())
            && !segment.starts_with(':')
            && !segment.contains(['{', '}', '*'])
    })
}
