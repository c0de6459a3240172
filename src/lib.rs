//! Dice-rolling HTTP service with OpenTelemetry lifecycle management.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServiceConfig;
pub use lifecycle::{bootstrap, Interrupt, ServiceRunner, TelemetryPipeline};
pub use observability::Telemetry;
