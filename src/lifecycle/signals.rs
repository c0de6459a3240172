//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for the first interrupt (Ctrl+C) exactly once
//! - Translate it into a terminal cancellation token
//! - Stop listening as soon as it has been observed
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Tokio never restores the default disposition, so after disarming a
//!   second Ctrl+C exits the process immediately with status 130
//! - Tests drive cancellation through the token, never through real signals

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Exit status used when a second interrupt forces termination.
pub const FORCED_EXIT_CODE: i32 = 130;

enum Source {
    Os { listener: Option<JoinHandle<()>> },
    Manual,
}

/// Process-wide cancellation driven by interrupt delivery.
///
/// Once the token is cancelled it stays cancelled.
pub struct Interrupt {
    token: CancellationToken,
    source: Source,
}

impl Interrupt {
    /// Arm a listener for the OS interrupt. Must be called inside a Tokio runtime.
    pub fn os() -> Self {
        let token = CancellationToken::new();
        let listener = tokio::spawn({
            let token = token.clone();
            async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Interrupt received");
                        token.cancel();
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for interrupt");
                    }
                }
            }
        });

        Self {
            token,
            source: Source::Os {
                listener: Some(listener),
            },
        }
    }

    /// An interrupt fired only through [`Interrupt::token`].
    pub fn manual() -> Self {
        Self {
            token: CancellationToken::new(),
            source: Source::Manual,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Stop listening. Idempotent.
    pub fn disarm(&mut self) {
        if let Source::Os { listener } = &mut self.source {
            if let Some(handle) = listener.take() {
                handle.abort();
                tokio::spawn(async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Second interrupt received, exiting immediately");
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                });
                tracing::debug!("Interrupt listener disarmed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_interrupt_is_terminal() {
        let interrupt = Interrupt::manual();
        assert!(!interrupt.is_triggered());

        interrupt.token().cancel();
        interrupt.cancelled().await;
        interrupt.token().cancel();

        assert!(interrupt.is_triggered());
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let mut interrupt = Interrupt::manual();
        interrupt.disarm();
        interrupt.disarm();
        assert!(!interrupt.is_triggered());
    }
}
