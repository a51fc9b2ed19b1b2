//! Shared application state for the ABR business search API.
//!
//! There is exactly one storage backend — PostgreSQL via
//! [`abr_persistence::Repository`] — so `AppState` is concrete: `Arc`-wrapped
//! shared state, cheap to clone per request, with config accessors.

use std::sync::Arc;
use std::time::Instant;

use abr_persistence::Repository;

use crate::config::ServerConfig;

/// Shared state handed to every handler via axum's `State` extractor.
pub struct AppState {
    repository: Arc<Repository>,
    config: Arc<ServerConfig>,
    started_at: Instant,
}

// Manually implemented since `Instant` has no meaningful `Default` that
// should be re-derived per clone — every clone must share the same
// `started_at` so `/api/v1/health` reports one process-wide uptime.
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            config: Arc::clone(&self.config),
            started_at: self.started_at,
        }
    }
}

impl AppState {
    pub fn new(repository: Arc<Repository>, config: ServerConfig) -> Self {
        Self {
            repository,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Seconds since this worker process constructed its `AppState`.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
