//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (lifecycle::runner)
//!     → server.rs (Axum setup, middleware, timeouts)
//!     → observability::instrument (span + metrics, business routes only)
//!     → rolldice.rs (business handler)
//!     → Send to client
//!
//! Scrape request
//!     → server.rs → Prometheus exposition
//! ```

pub mod rolldice;
pub mod server;

pub use server::{build_router, ROLLDICE_PATH};
