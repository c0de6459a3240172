//! The dice endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use opentelemetry::trace::{TraceContextExt as _, Tracer as _};
use opentelemetry::KeyValue;
use rand::Rng;

use crate::observability::Telemetry;

pub async fn roll_anonymous(State(telemetry): State<Arc<Telemetry>>) -> String {
    roll(&telemetry, None)
}

pub async fn roll_for_player(
    State(telemetry): State<Arc<Telemetry>>,
    Path(player): Path<String>,
) -> String {
    roll(&telemetry, Some(&player))
}

fn roll(telemetry: &Telemetry, player: Option<&str>) -> String {
    let value = telemetry.tracer().in_span("roll", |cx| {
        let value: u8 = rand::thread_rng().gen_range(1..=6);
        cx.span()
            .set_attribute(KeyValue::new("roll.value", i64::from(value)));
        value
    });

    match player {
        Some(player) => tracing::info!(player, result = value, "{player} is rolling the dice"),
        None => tracing::info!(result = value, "Anonymous player is rolling the dice"),
    }
    telemetry.metrics().record_roll(value);

    format!("{value}\n")
}
