//! Health check handlers

use axum::{extract::State, Json};

use crate::{error::Result, state::AppState};

/// Get relay health status
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "ml-tester-relay",
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": chrono::Utc::now()
    })))
}

/// Get relay information
pub async fn system_info(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "vision_api_version": state.config.upstream.vision_api_version,
    })))
}

/// Simple liveness probe
pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({
        "status": "alive",
        "timestamp": chrono::Utc::now()
    })))
}
