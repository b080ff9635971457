//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::ApiError;
use crate::handlers::clips::{delete_job, generate_clips, get_job_status};
use crate::handlers::health;
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging};
use crate::state::AppState;

async fn not_found() -> ApiError {
    ApiError::not_found("No such route")
}

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let clip_routes = Router::new()
        .route("/clips/generate", post(generate_clips))
        .route("/clips/status/:job_id", get(get_job_status))
        .route("/clips/:job_id", delete(delete_job))
        .route("/clips/health", get(health));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api", clip_routes)
        .route("/health", get(health))
        .merge(metrics_routes)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
