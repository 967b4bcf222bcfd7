//! Router configuration and route composition.

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{clients, health, import};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// # Arguments
///
/// * `state` - Shared services
/// * `cors_origins` - `"*"` or a comma-separated list of allowed origins
pub fn create_router(state: AppState, cors_origins: &str) -> Router {
    let import_routes = Router::new()
        .route("/", post(import::start_import))
        .route("/progress", get(import::get_progress))
        .route("/pause", post(import::pause_import))
        .route("/resume", post(import::resume_import))
        .route("/cancel", post(import::cancel_import))
        .route("/reset", post(import::reset_import));

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .nest("/import", import_routes)
        .route("/clients/:id/sync", post(clients::sync_client))
        .route("/clients/:id/send-flow", post(clients::send_flow));

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware layers (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}

/// Build CORS layer from configuration.
///
/// If `origins` is "*", allows any origin (for development).
/// Otherwise, parses comma-separated origins.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600));

    if origins.trim() == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(allowed)
    }
}
