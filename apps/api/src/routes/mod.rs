pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::extraction::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/extract", post(handlers::handle_extract))
        .route("/extract/hints", post(handlers::handle_hints))
        .with_state(state)
}
