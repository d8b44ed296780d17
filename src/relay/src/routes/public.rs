//! Public probe and metrics routes

use axum::{extract::State, routing::get, Router};

use crate::{handlers, state::AppState};

/// Create public routes router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/info", get(handlers::health::system_info))
        .route("/liveness", get(handlers::health::liveness))
        .route("/metrics", get(metrics_handler))
}

/// Prometheus metrics handler
async fn metrics_handler(State(state): State<AppState>) -> String {
    if !state.config.observability.metrics_enabled {
        return "# Metrics disabled\n".to_string();
    }
    state.metrics.render()
}
