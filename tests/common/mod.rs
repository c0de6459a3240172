//! Shared utilities for lifecycle and HTTP integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use rolldice_otel::config::{ServiceConfig, TelemetryConfig};
use rolldice_otel::lifecycle::{
    bootstrap, Interrupt, RunError, ServiceRunner, ShutdownError, ShutdownOp,
};
use rolldice_otel::observability::{
    Built, PrometheusProvider, ProviderError, ProviderFactory, ProviderKind, Telemetry,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub type Events = Arc<Mutex<Vec<String>>>;

pub const ALL_KINDS: [ProviderKind; 4] = [
    ProviderKind::Trace,
    ProviderKind::Metric,
    ProviderKind::PullMetric,
    ProviderKind::Log,
];

/// Provider factory with injectable failures and observable shutdowns.
///
/// Every shutdown appends `shutdown <kind>` to `events`.
#[derive(Clone, Default)]
pub struct FakeFactory {
    pub fail_at: Option<ProviderKind>,
    pub failing_shutdown: Option<ProviderKind>,
    pub events: Events,
    pub spans: InMemorySpanExporter,
    /// Receives push metrics on `force_flush`.
    pub metrics: InMemoryMetricExporter,
    /// When set, the trace shutdown records whether this address still accepts connections.
    pub listener_addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(kind: ProviderKind) -> Self {
        Self {
            fail_at: Some(kind),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn shutdowns(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with("shutdown "))
            .collect()
    }

    fn check(&self, kind: ProviderKind) -> Result<(), ProviderError> {
        if self.fail_at == Some(kind) {
            Err(ProviderError::SinkUnavailable {
                provider: kind,
                reason: "sink refused connection".into(),
            })
        } else {
            Ok(())
        }
    }

    fn op(&self, kind: ProviderKind) -> ShutdownOp {
        let events = self.events.clone();
        let listener_addr = self.listener_addr.clone();
        let fail = self.failing_shutdown == Some(kind);

        ShutdownOp::new(kind.as_str(), move |_deadline| async move {
            let listener_addr = *listener_addr.lock().unwrap();
            if let (ProviderKind::Trace, Some(addr)) = (kind, listener_addr) {
                let closed = tokio::net::TcpStream::connect(addr).await.is_err();
                events
                    .lock()
                    .unwrap()
                    .push(format!("listener closed: {closed}"));
            }

            events.lock().unwrap().push(format!("shutdown {kind}"));
            if fail {
                Err(ShutdownError::Failed {
                    component: kind.as_str(),
                    reason: "flush failed".into(),
                })
            } else {
                Ok(())
            }
        })
    }
}

impl ProviderFactory for FakeFactory {
    fn tracer_provider(
        &self,
        _config: &TelemetryConfig,
    ) -> Result<Built<SdkTracerProvider>, ProviderError> {
        self.check(ProviderKind::Trace)?;
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(self.spans.clone())
            .build();
        Ok(Built::new(provider, self.op(ProviderKind::Trace)))
    }

    fn meter_provider(
        &self,
        _config: &TelemetryConfig,
    ) -> Result<Built<SdkMeterProvider>, ProviderError> {
        self.check(ProviderKind::Metric)?;
        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(self.metrics.clone()).build())
            .build();
        Ok(Built::new(provider, self.op(ProviderKind::Metric)))
    }

    fn pull_meter_provider(
        &self,
        config: &TelemetryConfig,
    ) -> Result<Built<PrometheusProvider>, ProviderError> {
        self.check(ProviderKind::PullMetric)?;
        let provider = PrometheusProvider::new(&config.prometheus.namespace)?;
        Ok(Built::new(provider, self.op(ProviderKind::PullMetric)))
    }

    fn logger_provider(
        &self,
        _config: &TelemetryConfig,
    ) -> Result<Built<SdkLoggerProvider>, ProviderError> {
        self.check(ProviderKind::Log)?;
        Ok(Built::new(
            SdkLoggerProvider::builder().build(),
            self.op(ProviderKind::Log),
        ))
    }
}

/// Loopback config on an ephemeral port, without global provider slots.
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.server.bind_address = "127.0.0.1:0".into();
    config.server.shutdown_grace_ms = 5_000;
    config.telemetry.install_globals = false;
    config.telemetry.drain_timeout_ms = 5_000;
    config
}

/// A service started in the background.
pub struct Running {
    pub addr: SocketAddr,
    pub interrupt: CancellationToken,
    pub telemetry: Arc<Telemetry>,
    pub handle: JoinHandle<Result<(), RunError>>,
}

/// Bootstrap with `factory` and serve `router` (or the real router).
pub async fn start(
    config: ServiceConfig,
    factory: &FakeFactory,
    router: Option<Router>,
) -> Running {
    let pipeline = bootstrap(&config.telemetry, factory)
        .await
        .expect("bootstrap");
    let telemetry = pipeline.telemetry();
    let router =
        router.unwrap_or_else(|| rolldice_otel::http::build_router(&config, telemetry.clone()));

    let interrupt = Interrupt::manual();
    let token = interrupt.token();
    let (ready_tx, ready_rx) = oneshot::channel();
    let runner = ServiceRunner::new(config.server, router, interrupt).with_ready(ready_tx);
    let handle = tokio::spawn(runner.run(pipeline));

    let addr = tokio::time::timeout(Duration::from_secs(5), ready_rx)
        .await
        .expect("listener ready in time")
        .expect("listener reported address");
    *factory.listener_addr.lock().unwrap() = Some(addr);

    Running {
        addr,
        interrupt: token,
        telemetry,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
