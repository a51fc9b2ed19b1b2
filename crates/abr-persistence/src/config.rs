//! Pool configuration shared by the serving plane and the ingestion plane.
//!
//! Each plane builds its own [`deadpool_postgres::Pool`] from a
//! [`DatabaseConfig`] — pools are never shared across the process/thread
//! boundary (§5, "Connection-pool-per-plane").

use std::time::Duration;

use deadpool_postgres::{Config as DeadpoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::{Deserialize, Serialize};
use tokio_postgres::NoTls;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Relaxes certificate verification when true, matching the permissive
    /// default posture of managed-Postgres TLS setups that present a
    /// self-signed or provider CA chain the local trust store doesn't know.
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_pool_min")]
    pub pool_min: usize,
    #[serde(default = "default_pool_max")]
    pub pool_max: usize,
    /// How long an ingestion-pool connection may sit idle before being
    /// recycled on next checkout (`etl.pool_idle_timeout_ms`, default
    /// 240,000ms). `None` (the serving plane's default) keeps the
    /// [`ACQUIRE_CONNECTION_TIMEOUT`] recycle window.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

fn default_pool_min() -> usize {
    2
}

fn default_pool_max() -> usize {
    10
}

/// Connections never wait longer than this to be acquired from a pool
/// before the caller sees a [`StorageError::Pool`] timeout (§5).
pub const ACQUIRE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

impl DatabaseConfig {
    /// Builds a pool sized for the given bounds. `ssl` is currently accepted
    /// for configuration-surface completeness; connecting over TLS requires
    /// linking a TLS connector, which this crate does not do by default
    /// (plain `NoTls`, matching most private-network deployments of this
    /// system).
    pub fn build_pool(&self) -> StorageResult<Pool> {
        let mut cfg = DeadpoolConfig::new();
        cfg.url = Some(self.url.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let recycle_timeout = match self.idle_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => ACQUIRE_CONNECTION_TIMEOUT,
        };
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: self.pool_max.max(1),
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(ACQUIRE_CONNECTION_TIMEOUT),
                create: Some(ACQUIRE_CONNECTION_TIMEOUT),
                recycle: Some(recycle_timeout),
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StorageError::Validation {
                message: format!("invalid database configuration: {e}"),
            })
    }
}
