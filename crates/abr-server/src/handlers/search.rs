//! `GET /api/v1/businesses/search` (§4.6.3, §4.6.4).

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use abr_domain::{Business, SearchPage, SearchQuery};

use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestStart;
use crate::state::AppState;

/// Raw query-string shape; every field is optional because absent
/// parameters must normalize to `None`, never to `Some("")` (§4.6.4).
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    #[serde(rename = "entityType")]
    pub entity_type: Option<String>,
    #[serde(rename = "abnStatus")]
    pub abn_status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub mode: Option<String>,
    pub technique: Option<String>,
}

/// Normalizes an optional string parameter: trims, and treats an
/// empty/whitespace-only value as absent.
fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    })
}

impl SearchParams {
    fn into_query(self) -> (SearchQuery, String, String) {
        let mode = normalize(self.mode).unwrap_or_else(|| "standard".to_string());
        let technique = normalize(self.technique).unwrap_or_else(|| "native".to_string());

        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, 100);

        let query = SearchQuery {
            term: normalize(self.q),
            state: normalize(self.state),
            postcode: normalize(self.postcode),
            entity_type: normalize(self.entity_type),
            abn_status: normalize(self.abn_status),
            page,
            limit,
        };

        (query, mode, technique)
    }
}

#[derive(Debug, Serialize)]
struct SearchEnvelope {
    status: &'static str,
    data: Vec<Business>,
    pagination: abr_domain::Pagination,
    meta: SearchMeta,
}

#[derive(Debug, Serialize)]
struct SearchMeta {
    #[serde(rename = "queryTimeMs")]
    query_time_ms: u64,
    #[serde(rename = "totalTimeMs")]
    total_time_ms: u64,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Extension(RequestStart(started)): Extension<RequestStart>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (query, mode, technique) = params.into_query();

    let page: SearchPage<Business> = match (mode.as_str(), technique.as_str()) {
        ("ai", _) => {
            return Err(ApiError::NotImplemented(
                "AI search (mode=ai) is not implemented".to_string(),
            ));
        }
        ("standard", "optimized") => state.repository().search_optimized(&query).await?,
        ("standard", "native") => state.repository().search_native(&query).await?,
        ("standard", other) => {
            return Err(ApiError::Validation(format!(
                "unknown search technique: {other}"
            )));
        }
        (other, _) => {
            return Err(ApiError::Validation(format!("unknown search mode: {other}")));
        }
    };

    let envelope = SearchEnvelope {
        status: "success",
        data: page.data,
        pagination: page.pagination,
        meta: SearchMeta {
            query_time_ms: page.meta.query_time_ms,
            total_time_ms: started.elapsed().as_millis() as u64,
        },
    };

    Ok(Json(json!(envelope)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_params_normalize_to_standard_native_defaults() {
        let params = SearchParams {
            q: None,
            state: None,
            postcode: None,
            entity_type: None,
            abn_status: None,
            page: None,
            limit: None,
            mode: None,
            technique: None,
        };
        let (query, mode, technique) = params.into_query();
        assert_eq!(mode, "standard");
        assert_eq!(technique, "native");
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 20);
        assert!(query.term.is_none());
    }

    #[test]
    fn empty_string_params_normalize_to_none() {
        let params = SearchParams {
            q: Some("   ".to_string()),
            state: Some("".to_string()),
            postcode: None,
            entity_type: None,
            abn_status: None,
            page: None,
            limit: None,
            mode: None,
            technique: None,
        };
        let (query, _, _) = params.into_query();
        assert!(query.term.is_none());
        assert!(query.state.is_none());
    }

    #[test]
    fn page_and_limit_are_clamped() {
        let params = SearchParams {
            q: None,
            state: None,
            postcode: None,
            entity_type: None,
            abn_status: None,
            page: Some(0),
            limit: Some(1_000),
            mode: None,
            technique: None,
        };
        let (query, _, _) = params.into_query();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 100);
    }
}
