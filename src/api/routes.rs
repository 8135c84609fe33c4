//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, invalidate_handler, invalidations_handler, reset_metrics_handler,
    stats_handler, strategy_stats_handler, warm_dashboard_handler, warmup_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Far store ping, 503 when it fails
/// - `GET /stats` - Near, far and performance statistics
/// - `GET /stats/strategies` - Per-strategy analytics and recommendations
/// - `POST /invalidate` - Invalidate keys matching a glob pattern
/// - `GET /invalidations` - Recent invalidations, newest first
/// - `POST /warmup` - Baseline (or `{"full": true}`) warm-up
/// - `PUT /warmup/dashboard/:id` - Pre-populate a dashboard's keys
/// - `DELETE /metrics` - Reset metrics
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/stats/strategies", get(strategy_stats_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/invalidations", get(invalidations_handler))
        .route("/warmup", post(warmup_handler))
        .route("/warmup/dashboard/:id", put(warm_dashboard_handler))
        .route("/metrics", delete(reset_metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
