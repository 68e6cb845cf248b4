//! HTTP API surface: models, handlers and the router.

pub mod disconnect;
pub mod handlers;
pub mod models;

pub use handlers::AppState;

use crate::core::{request_id_middleware, MetricsMiddleware};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router with its middleware stack.
///
/// Layers run outermost first: tracing, CORS, request id, then metrics, so
/// metrics and handler logs both see the request id.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat-completion", post(handlers::chat_completion))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
