//! Liveness, readiness, and Prometheus scrape endpoints (§4.9, §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Serialize)]
struct ReadyBody {
    database: bool,
    pgvector: bool,
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let readiness = lore_db::check_readiness(&state.pool).await;
    let status = if readiness.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(ReadyBody { database: readiness.database, pgvector: readiness.pgvector })).into_response()
}

/// `METRICS_ENABLED=false` makes this endpoint behave as if it didn't exist.
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.metrics.encode().into_response()
}
