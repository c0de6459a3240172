//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Propagator → trace → metric → pull metric → log provider
//!     each success registers its shutdown (shutdown.rs)
//!     any failure drains what was registered and aborts
//!
//! Running (runner.rs):
//!     Listener task ⟷ interrupt (signals.rs), whichever ends first
//!
//! Shutdown (runner.rs → shutdown.rs):
//!     Disarm interrupt → stop accepting → finish in-flight → drain registry
//! ```
//!
//! # Design Decisions
//! - Ordered startup, FIFO shutdown (creation order)
//! - Every shutdown failure is collected, none short-circuits the rest
//! - Shutdown has a deadline: the grace bound for HTTP, the drain timeout for telemetry

pub mod runner;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use runner::{RunError, ServeError, ServiceRunner};
pub use shutdown::{ShutdownError, ShutdownErrors, ShutdownOp, ShutdownRegistry};
pub use signals::Interrupt;
pub use startup::{bootstrap, StartupError, StartupPhase, TelemetryPipeline};
