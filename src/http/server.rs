//! HTTP router setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the business and scrape routes
//! - Instrument business routes with spans and request metrics
//! - Wire up middleware (request ID, read/write timeouts, access logs)

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::rolldice;
use crate::observability::instrument::track_request;
use crate::observability::Telemetry;

/// Path of the business route; `/{player}` is an optional extra segment and
/// a bare trailing slash rolls anonymously.
pub const ROLLDICE_PATH: &str = "/rolldice";

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Build the service router.
///
/// Only the business routes are instrumented; scrapes are not counted.
#[allow(deprecated)]
pub fn build_router(config: &ServiceConfig, telemetry: Arc<Telemetry>) -> Router {
    Router::new()
        .route(ROLLDICE_PATH, get(rolldice::roll_anonymous))
        .route(&format!("{ROLLDICE_PATH}/"), get(rolldice::roll_anonymous))
        .route(&format!("{ROLLDICE_PATH}/{{player}}"), get(rolldice::roll_for_player))
        .route_layer(middleware::from_fn_with_state(
            telemetry.clone(),
            track_request,
        ))
        .route(&config.telemetry.prometheus.path, get(scrape))
        .with_state(telemetry)
        .layer(RequestBodyTimeoutLayer::new(config.server.read_timeout()))
        .layer(TimeoutLayer::new(config.server.write_timeout()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
}

async fn scrape(State(telemetry): State<Arc<Telemetry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        telemetry.prometheus().render(),
    )
}
