//! Relay API routes

use axum::{routing::post, Router};

use crate::{handlers, state::AppState};

/// Create relay routes router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/proxy", post(handlers::proxy::relay))
        .route("/proxy/", post(handlers::proxy::relay))
}
