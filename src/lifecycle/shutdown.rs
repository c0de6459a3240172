//! Shutdown registry for telemetry providers.
//!
//! Every successfully built provider hands its shutdown operation to the
//! [`ShutdownRegistry`]. Draining runs them oldest-first against one shared
//! deadline and joins every failure instead of stopping at the first.

use std::fmt;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::time::Instant;

/// Failure of a single registered shutdown operation.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("{component} shutdown failed: {reason}")]
    Failed {
        component: &'static str,
        reason: String,
    },

    #[error("{component} shutdown did not finish before the drain deadline")]
    TimedOut { component: &'static str },
}

impl ShutdownError {
    pub fn component(&self) -> &'static str {
        match self {
            ShutdownError::Failed { component, .. } | ShutdownError::TimedOut { component } => {
                component
            }
        }
    }
}

/// Every failure observed while draining, in registration order.
#[derive(Debug, Error)]
pub struct ShutdownErrors(Vec<ShutdownError>);

impl ShutdownErrors {
    pub fn errors(&self) -> &[ShutdownError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ShutdownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

type ShutdownFn = Box<dyn FnOnce(Instant) -> BoxFuture<'static, Result<(), ShutdownError>> + Send>;

/// A deferred, run-once cleanup for one component.
pub struct ShutdownOp {
    component: &'static str,
    run: ShutdownFn,
}

impl ShutdownOp {
    /// Wrap an async shutdown. The closure receives the drain deadline.
    pub fn new<F, Fut>(component: &'static str, f: F) -> Self
    where
        F: FnOnce(Instant) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        Self {
            component,
            run: Box::new(move |deadline| f(deadline).boxed()),
        }
    }

    /// Wrap a blocking shutdown (SDK providers block while flushing).
    ///
    /// The call runs on the blocking pool so the drain deadline can still be
    /// enforced from the async side.
    pub fn blocking<F>(component: &'static str, f: F) -> Self
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        Self::new(component, move |_deadline| async move {
            match tokio::task::spawn_blocking(f).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(reason)) => Err(ShutdownError::Failed { component, reason }),
                Err(join) => Err(ShutdownError::Failed {
                    component,
                    reason: join.to_string(),
                }),
            }
        })
    }

    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl fmt::Debug for ShutdownOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownOp")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of shutdown operations.
///
/// Appends happen only during sequential startup and the drain only during
/// sequential shutdown, so the sequence needs no lock.
#[derive(Debug, Default)]
pub struct ShutdownRegistry {
    ops: Vec<ShutdownOp>,
}

impl ShutdownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, op: ShutdownOp) {
        tracing::debug!(component = op.component, "Shutdown registered");
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every registered operation in registration order, then clear.
    ///
    /// A second call finds nothing to run and returns `Ok(())`.
    pub async fn drain(&mut self, deadline: Instant) -> Result<(), ShutdownErrors> {
        let ops = std::mem::take(&mut self.ops);
        if ops.is_empty() {
            return Ok(());
        }

        tracing::info!(count = ops.len(), "Draining telemetry shutdown registry");

        let mut errors = Vec::new();
        for op in ops {
            let component = op.component;
            let outcome = match tokio::time::timeout_at(deadline, (op.run)(deadline)).await {
                Ok(result) => result,
                Err(_) => Err(ShutdownError::TimedOut { component }),
            };

            match outcome {
                Ok(()) => tracing::debug!(component, "Shutdown complete"),
                Err(e) => {
                    tracing::warn!(component, error = %e, "Shutdown failed");
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ShutdownErrors(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> ShutdownOp {
        let log = log.clone();
        ShutdownOp::new(name, move |_| async move {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    fn failing(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> ShutdownOp {
        let log = log.clone();
        ShutdownOp::new(name, move |_| async move {
            log.lock().unwrap().push(name);
            Err(ShutdownError::Failed {
                component: name,
                reason: "flush refused".into(),
            })
        })
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_drain_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ShutdownRegistry::new();
        registry.register(recording(&log, "trace provider"));
        registry.register(recording(&log, "metric provider"));
        registry.register(recording(&log, "log provider"));

        registry.drain(deadline()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["trace provider", "metric provider", "log provider"]
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_drain_collects_every_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ShutdownRegistry::new();
        registry.register(failing(&log, "first"));
        registry.register(recording(&log, "second"));
        registry.register(failing(&log, "third"));

        let errors = registry.drain(deadline()).await.unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.errors()[0].component(), "first");
        assert_eq!(errors.errors()[1].component(), "third");
        let rendered = errors.to_string();
        assert!(rendered.contains("first shutdown failed"));
        assert!(rendered.contains("third shutdown failed"));
    }

    #[tokio::test]
    async fn test_second_drain_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ShutdownRegistry::new();
        registry.register(failing(&log, "only"));

        assert!(registry.drain(deadline()).await.is_err());
        assert!(registry.drain(deadline()).await.is_ok());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_op_times_out_without_blocking_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ShutdownRegistry::new();
        registry.register(ShutdownOp::new("stuck", |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
        registry.register(recording(&log, "after"));

        let errors = registry
            .drain(Instant::now() + Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(
            errors.errors()[0],
            ShutdownError::TimedOut { component: "stuck" }
        ));
        // Past the deadline an op that is immediately ready still completes.
        assert_eq!(errors.len(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_blocking_op_reports_error() {
        let mut registry = ShutdownRegistry::new();
        registry.register(ShutdownOp::blocking("blocking", || Err("exporter closed".into())));

        let errors = registry.drain(deadline()).await.unwrap_err();
        assert_eq!(
            errors.to_string(),
            "blocking shutdown failed: exporter closed"
        );
    }
}
