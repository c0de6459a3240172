//! Service runner: listener, interrupt race, ordered teardown.
//!
//! # Shutdown Order
//! ```text
//! listener error ───────────────────────────────┐
//!                                               ├─→ drain telemetry registry
//! interrupt → disarm → stop accepting → drain   │
//!             in-flight within grace bound ─────┘
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{Extension, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::lifecycle::shutdown::ShutdownErrors;
use crate::lifecycle::signals::Interrupt;
use crate::lifecycle::startup::TelemetryPipeline;

/// Failure of the HTTP listener.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    GraceExceeded(Duration),

    #[error("HTTP server task failed: {0}")]
    Task(#[from] JoinError),
}

/// Everything that went wrong during a run, joined.
#[derive(Debug, Error)]
pub struct RunError {
    serve: Option<ServeError>,
    drain: Option<ShutdownErrors>,
}

impl RunError {
    pub fn serve(&self) -> Option<&ServeError> {
        self.serve.as_ref()
    }

    pub fn drain(&self) -> Option<&ShutdownErrors> {
        self.drain.as_ref()
    }

    fn join(serve: Result<(), ServeError>, drain: Result<(), ShutdownErrors>) -> Result<(), Self> {
        match (serve, drain) {
            (Ok(()), Ok(())) => Ok(()),
            (serve, drain) => Err(Self {
                serve: serve.err(),
                drain: drain.err(),
            }),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if let Some(serve) = &self.serve {
            write!(f, "{serve}")?;
            first = false;
        }
        if let Some(drain) = &self.drain {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{drain}")?;
        }
        Ok(())
    }
}

/// Runs the HTTP listener until it fails or the interrupt fires.
pub struct ServiceRunner {
    config: ServerConfig,
    router: Router,
    interrupt: Interrupt,
    ready: Option<oneshot::Sender<SocketAddr>>,
}

impl ServiceRunner {
    pub fn new(config: ServerConfig, router: Router, interrupt: Interrupt) -> Self {
        Self {
            config,
            router,
            interrupt,
            ready: None,
        }
    }

    /// Report the bound address once the listener accepts connections.
    pub fn with_ready(mut self, ready: oneshot::Sender<SocketAddr>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Serve until a listener error or an interrupt, then drain telemetry.
    ///
    /// The pipeline is drained exactly once on every exit path, after the
    /// listener has closed.
    pub async fn run(mut self, mut pipeline: TelemetryPipeline) -> Result<(), RunError> {
        let served = self.serve().await;
        if let Err(e) = &served {
            tracing::error!(error = %e, "HTTP server stopped with error");
        }

        let drained = pipeline.shutdown().await;
        RunError::join(served, drained)
    }

    async fn serve(&mut self) -> Result<(), ServeError> {
        // Handlers may extract `Extension<CancellationToken>` to cut long work
        // short; the listener stops on its own token.
        let router = self
            .router
            .clone()
            .layer(Extension(self.interrupt.token()));
        let stop_accepting = CancellationToken::new();

        let mut listener = tokio::spawn(listen(
            self.config.bind_address.clone(),
            router,
            stop_accepting.clone(),
            self.ready.take(),
        ));

        tokio::select! {
            result = &mut listener => return flatten(result),
            _ = self.interrupt.cancelled() => {}
        }

        self.interrupt.disarm();
        tracing::info!(
            grace_ms = self.config.shutdown_grace_ms,
            "Shutting down HTTP server"
        );
        stop_accepting.cancel();

        let grace = self.config.shutdown_grace();
        match tokio::time::timeout(grace, &mut listener).await {
            Ok(result) => flatten(result),
            Err(_) => {
                listener.abort();
                Err(ServeError::GraceExceeded(grace))
            }
        }
    }
}

fn flatten(result: Result<Result<(), ServeError>, JoinError>) -> Result<(), ServeError> {
    result?
}

async fn listen(
    address: String,
    router: Router,
    stop_accepting: CancellationToken,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), ServeError> {
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServeError::Bind {
            address: address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "HTTP server listening");
    if let Some(ready) = ready {
        let _ = ready.send(local_addr);
    }

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(stop_accepting.cancelled_owned())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
