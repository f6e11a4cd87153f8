pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/interviews", post(handlers::handle_start))
        .route("/api/v1/interviews/:id/reply", post(handlers::handle_reply))
        .route(
            "/api/v1/interviews/:id/finish",
            post(handlers::handle_finish),
        )
        .with_state(state)
}
