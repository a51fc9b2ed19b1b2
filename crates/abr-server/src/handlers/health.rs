//! `GET /api/v1/health` (§6.1).

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
