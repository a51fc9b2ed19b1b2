//! `POST /api/v1/ingest` (§6.1, §4.5).
//!
//! Drives the same Orchestrator entry point the offline seed CLI uses, and
//! resolves the HTTP response the same way: wait for the first `Done`, fail
//! on the first `Error`, fail if the thread exits without either.

use std::path::PathBuf;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use abr_ingest::{IngestEvent, IngestRequest, spawn_ingestion};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequestBody {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct IngestResponseBody {
    status: &'static str,
    #[serde(rename = "totalProcessed")]
    total_processed: u64,
    #[serde(rename = "totalInserted")]
    total_inserted: u64,
    #[serde(rename = "totalUpdated")]
    total_updated: u64,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
}

pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequestBody>,
) -> ApiResult<Json<IngestResponseBody>> {
    if payload.file_path.trim().is_empty() {
        return Err(ApiError::Validation("filePath is required".to_string()));
    }

    let request = IngestRequest {
        file_path: PathBuf::from(payload.file_path),
        database: state.config().ingestion_database_config(),
        writer: state.config().batch_writer_config(),
    };

    let rx = spawn_ingestion(request);

    let outcome = tokio::task::spawn_blocking(move || drain_to_terminal_event(rx))
        .await
        .map_err(|e| ApiError::Internal(format!("ingestion task panicked: {e}")))?;

    let (total_processed, total_inserted, total_updated, duration_ms) =
        outcome.map_err(ApiError::Internal)?;

    Ok(Json(IngestResponseBody {
        status: "success",
        total_processed,
        total_inserted,
        total_updated,
        duration_ms,
    }))
}

type TerminalOutcome = Result<(u64, u64, u64, u64), String>;

fn drain_to_terminal_event(rx: std::sync::mpsc::Receiver<IngestEvent>) -> TerminalOutcome {
    loop {
        match rx.recv() {
            Ok(IngestEvent::Progress { processed }) => {
                debug!(processed, "ingest progress");
            }
            Ok(IngestEvent::Done {
                total_processed,
                total_inserted,
                total_updated,
                duration_ms,
            }) => return Ok((total_processed, total_inserted, total_updated, duration_ms)),
            Ok(IngestEvent::Error { message }) => return Err(message),
            Err(_) => {
                return Err("ingestion thread exited without a terminal event".to_string());
            }
        }
    }
}
