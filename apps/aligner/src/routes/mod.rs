pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::tailoring::handlers;

/// Resume uploads above this size are rejected before parsing.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Alignment API
        .route("/api/v1/align", post(handlers::handle_align))
        .route("/api/v1/requirements", post(handlers::handle_requirements))
        .route("/api/v1/reports/:handle", get(handlers::handle_get_report))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
