pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::careers::handlers::handle_careers;
use crate::ingestion::handlers::handle_ingest;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/ingest", post(handle_ingest))
        .route("/api/v1/careers", post(handle_careers))
        .with_state(state)
}
