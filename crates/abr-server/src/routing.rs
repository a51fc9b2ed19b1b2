//! Route table for the ABR business search API (§6.1).

use axum::{Router, routing::get, routing::post};

use crate::handlers::{by_abn_handler, health_handler, ingest_handler, search_handler};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/businesses/search", get(search_handler))
        .route("/api/v1/businesses/{abn}", get(by_abn_handler))
        .route("/api/v1/ingest", post(ingest_handler))
        .with_state(state)
}
