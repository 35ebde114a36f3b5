mod analyze;
mod entities;
mod health;
mod metrics;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};

pub use analyze::AnalyzeCameraRequest;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/api/services/analyze_camera",
            post(analyze::analyze_camera),
        )
        .route("/api/states", get(entities::list_states))
        .route("/api/states/{entity_id}", get(entities::get_state))
        .route("/api/camera_proxy/{entity_id}", get(entities::camera_proxy))
}
