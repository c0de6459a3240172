//! Per-request instrumentation middleware.
//!
//! Wraps the business routes: every request gets a server span tagged with the
//! matched route pattern, runs inside that span's context, and is counted on
//! both metric providers once the response is ready.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::context::FutureExt as _;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt as _, Tracer as _};
use opentelemetry::KeyValue;

use crate::observability::propagation::extract_context;
use crate::observability::telemetry::Telemetry;

pub async fn track_request(
    State(telemetry): State<Arc<Telemetry>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let method = request.method().as_str().to_owned();

    let parent = extract_context(telemetry.propagator(), request.headers());
    let tracer = telemetry.tracer();
    let span = tracer
        .span_builder(format!("{method} {route}"))
        .with_kind(SpanKind::Server)
        .with_attributes(vec![
            KeyValue::new("http.route", route.clone()),
            KeyValue::new("http.request.method", method.clone()),
            KeyValue::new("url.path", request.uri().path().to_owned()),
        ])
        .start_with_context(tracer, &parent);
    let cx = parent.with_span(span);

    let started = Instant::now();
    let response = next.run(request).with_context(cx.clone()).await;
    let status = response.status();

    let span = cx.span();
    span.set_attribute(KeyValue::new(
        "http.response.status_code",
        i64::from(status.as_u16()),
    ));
    if status.is_server_error() {
        span.set_status(Status::error(status.to_string()));
    }
    span.end();

    telemetry
        .metrics()
        .record_request(&route, &method, status.as_u16(), started.elapsed());

    response
}
