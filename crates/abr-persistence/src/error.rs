//! Error types for the persistence layer.
//!
//! `StorageError` is the single error type the Repository, Batch Writer, and
//! Orchestrator all propagate via `?`/`#[from]`. It deliberately does not
//! know about HTTP status codes — that mapping lives at the server's
//! `ApiError` boundary (`abr-server::error`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The requested business does not exist.
    #[error("business not found: {abn}")]
    NotFound { abn: String },

    /// An upsert violated a constraint other than the expected `abn` conflict
    /// target — should not occur under the Batch Writer's invariants.
    #[error("integrity conflict: {message}")]
    Conflict { message: String },

    /// Caller supplied a value the Repository can't act on (e.g. an unknown
    /// search technique reaching this layer, which should have been rejected
    /// upstream).
    #[error("invalid request: {message}")]
    Validation { message: String },

    /// A connection-level failure classified as retryable by
    /// [`crate::retry::is_transient`]. Ingestion retries this locally; if it
    /// reaches the HTTP boundary it means retries were exhausted.
    #[error("transient connection failure: {0}")]
    Transient(#[source] tokio_postgres::Error),

    /// Pool exhaustion / acquisition timeout.
    #[error("failed to acquire a database connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// Anything else: a bug, an unexpected SQLSTATE, a serialization failure.
    #[error("unexpected storage error: {0}")]
    Unexpected(#[source] tokio_postgres::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Classifies a raw `tokio_postgres::Error` into a `StorageError`, routing
/// transient connection failures (§4.3.3) to the retryable variant and
/// everything else to `Unexpected`.
pub fn classify(err: tokio_postgres::Error) -> StorageError {
    if crate::retry::is_transient(&err) {
        StorageError::Transient(err)
    } else {
        StorageError::Unexpected(err)
    }
}
