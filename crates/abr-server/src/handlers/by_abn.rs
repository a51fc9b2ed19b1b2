//! `GET /api/v1/businesses/:abn` (§6.1, §4.2.3).

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestStart;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ByAbnMeta {
    #[serde(rename = "queryTimeMs")]
    query_time_ms: u64,
    #[serde(rename = "totalTimeMs")]
    total_time_ms: u64,
}

pub async fn by_abn_handler(
    State(state): State<AppState>,
    Extension(RequestStart(started)): Extension<RequestStart>,
    Path(abn): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let (business, query_time_ms) = state.repository().find_by_abn(&abn).await?;

    let business = business.ok_or_else(|| ApiError::NotFound(format!("Business not found: {abn}")))?;

    Ok(Json(json!({
        "status": "success",
        "data": business,
        "meta": ByAbnMeta {
            query_time_ms,
            total_time_ms: started.elapsed().as_millis() as u64,
        },
    })))
}
