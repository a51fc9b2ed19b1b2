//! Ingestion Orchestrator (C5).
//!
//! Runs the parser/adapter/writer pipeline on a dedicated OS thread with its
//! own current-thread `tokio` runtime and its own connection pool, isolated
//! from the shared multi-threaded runtime that serves HTTP requests. Both
//! the HTTP `/api/v1/ingest` handler and the offline seed CLI drive this
//! same entry point and see the identical message contract.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

use abr_etl::{parse_file, BatchWriter, BatchWriterConfig, ParseProgress};
use abr_persistence::DatabaseConfig;
use thiserror::Error;
use tracing::error;

/// Everything the orchestrator thread needs, owned independently of the
/// caller's runtime.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub file_path: PathBuf,
    pub database: DatabaseConfig,
    pub writer: BatchWriterConfig,
}

/// The discriminated message stream emitted over the channel (§4.5).
#[derive(Debug, Clone)]
pub enum IngestEvent {
    Progress { processed: u64 },
    Done {
        total_processed: u64,
        total_inserted: u64,
        total_updated: u64,
        duration_ms: u64,
    },
    Error { message: String },
}

#[derive(Debug, Error)]
enum IngestError {
    #[error(transparent)]
    Storage(#[from] abr_persistence::StorageError),
    #[error(transparent)]
    Parse(#[from] abr_etl::parser::ParseError),
}

/// Spawns the ingestion run on its own OS thread and returns a receiver the
/// caller polls (or bridges into an async channel) for `Progress`, `Done`,
/// and `Error` events. The caller should treat the run as failed if the
/// receiver disconnects without ever yielding `Done` or `Error` — that
/// indicates the thread panicked.
pub fn spawn_ingestion(request: IngestRequest) -> Receiver<IngestEvent> {
    let (tx, rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = tx.send(IngestEvent::Error {
                    message: format!("failed to start ingestion runtime: {err}"),
                });
                return;
            }
        };

        runtime.block_on(run(request, tx));
    });

    rx
}

async fn run(request: IngestRequest, tx: Sender<IngestEvent>) {
    if let Err(err) = run_inner(&request, &tx).await {
        error!(error = %err, file = %request.file_path.display(), "ingestion run failed");
        let _ = tx.send(IngestEvent::Error { message: err.to_string() });
    }
}

async fn run_inner(request: &IngestRequest, tx: &Sender<IngestEvent>) -> Result<(), IngestError> {
    let pool = request.database.build_pool()?;

    {
        let client = pool.get().await?;
        abr_persistence::schema::initialize(&client).await?;
    }

    let writer = BatchWriter::new(pool, request.writer.clone());

    let progress_tx = tx.clone();
    let outcome = parse_file(&request.file_path, writer, move |progress: ParseProgress| {
        let _ = progress_tx.send(IngestEvent::Progress {
            processed: progress.processed,
        });
    })
    .await?;

    let _ = tx.send(IngestEvent::Done {
        total_processed: outcome.total_processed,
        total_inserted: outcome.total_inserted,
        total_updated: outcome.total_updated,
        duration_ms: outcome.duration_ms,
    });

    Ok(())
}
