//! services/api/src/web/routes.rs
//!
//! Builds the API router.

use crate::web::{
    middleware::require_user,
    rest::{
        get_streak_handler, record_reading_event_handler, recompute_daily_summary_handler,
        run_batch_handler,
    },
    state::AppState,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Builds the `/api/v1` router. CORS and Swagger UI are layered on by the binary.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/reading-events", post(record_reading_event_handler))
        .route("/streak", get(get_streak_handler))
        .route("/daily-summary", post(recompute_daily_summary_handler))
        .route("/batch/run", post(run_batch_handler))
        .layer(axum_middleware::from_fn(require_user));

    Router::new()
        .nest("/api/v1", protected_routes)
        .with_state(state)
}
