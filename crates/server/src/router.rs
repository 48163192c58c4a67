//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}

/// Build the control API router.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/asic/summary", get(api::summaries))
        .route("/api/asic/{name}/summary", get(api::summary))
        .route("/api/asic/{name}/raw", get(api::raw))
        .route("/api/asic/{name}/hashing", post(api::set_hashing))
        .route("/api/asic/{name}/power-limit", post(api::set_power_limit))
        .route("/api/asic/{name}/set-override", post(api::set_override))
        .route("/api/asic/{name}/override", axum::routing::delete(api::clear_override))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}
