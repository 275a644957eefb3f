// Module: http
// HTTP/JSON API: engine webhooks, stream key issuance and simulcast management

pub mod error;
pub mod health;
pub mod rtmp;
pub mod streams;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relaycast_livestream::SimulcastService;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub simulcast: Arc<SimulcastService>,
}

/// Create the HTTP router with all routes
pub fn create_router(simulcast: Arc<SimulcastService>) -> Router {
    let state = AppState { simulcast };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::create_health_router())
        // Relay engine callbacks
        .merge(rtmp::create_rtmp_router())
        .merge(streams::create_stream_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
