pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

/// Upper bound for the multipart upload (CV file + job description).
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::handle_home))
        .route("/health", get(health::health_handler))
        .route("/generate", post(handlers::handle_generate))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
