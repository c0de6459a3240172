//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     providers.rs builds trace / metric / pull metric / log providers
//!     → telemetry.rs bundles them into one shared context
//!     → logging.rs bridges `tracing` events into the log provider
//!
//! Per request:
//!     propagation.rs extracts remote context from headers
//!     → instrument.rs opens a server span tagged with the route
//!     → metrics.rs counts the request on both metric providers
//!
//! Consumers:
//!     → push exporters (stdout or OTLP) on fixed intervals
//!     → scrape endpoint (Prometheus text format)
//! ```
//!
//! # Design Decisions
//! - Providers are passed explicitly; request handling never reads globals
//! - Push and pull metric providers both receive every measurement

pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod providers;
pub mod telemetry;

pub use providers::{
    Built, PrometheusProvider, ProviderError, ProviderFactory, ProviderKind, SdkProviderFactory,
};
pub use telemetry::Telemetry;
