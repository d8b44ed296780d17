//! ML Tester Relay Library
//!
//! Server-side relay that forwards client requests to an Azure ML scoring
//! endpoint or the Vision image-analysis API, so callers are not subject to
//! browser cross-origin restrictions.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware_layer;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{Config, ObservabilityConfig, ServerConfig, UpstreamConfig};
pub use error::{ApiError, Result};
pub use state::AppState;

use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Build the main application router with all middleware and routes
pub fn build_router(state: AppState) -> Router {
    let api_routes = routes::api::router();
    let public_routes = routes::public::router();

    Router::new()
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(
                    middleware_layer::logging::logging_middleware,
                )),
        )
        .with_state(state)
}
