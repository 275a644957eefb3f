//! Health check endpoint
//!
//! Always answers 200 while the server runs; the body reports whether the
//! relay engine is reachable.

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;

use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineHealth,
}

#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub strategy: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub active_streams: usize,
    pub workers: usize,
}

pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay = state.simulcast.relay();
    let probe = relay.health_check().await;
    let healthy = probe.is_ok();

    Json(HealthResponse {
        status: if healthy { "OK" } else { "DEGRADED" },
        engine: EngineHealth {
            strategy: relay.engine_name(),
            healthy,
            error: probe.err().map(|e| e.to_string()),
            active_streams: relay.len(),
            workers: state.simulcast.supervisor().len(),
        },
    })
}
