use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, ingest, middleware::metrics_middleware, scheduler};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Submission and status, served both at the root and under /api/v1
    let ingest_routes = Router::new()
        .route("/ingest", post(ingest::submit))
        .route("/status/{id}", get(ingest::get_status));

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Scheduler
        .route("/scheduler", get(scheduler::get_status))
        .route("/scheduler/start", post(scheduler::start))
        .route("/scheduler/stop", post(scheduler::stop))
        .merge(ingest_routes.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(ingest_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
