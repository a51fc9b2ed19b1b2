//! Server configuration for the ABR business search API.
//!
//! A `clap::Parser`-derived struct whose fields fall back to environment
//! variables, which themselves fall back to hardcoded defaults, validated
//! once at startup by [`ServerConfig::validate`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ABR_SERVER_PORT` | 8080 | HTTP listen port |
//! | `ABR_SERVER_HOST` | 0.0.0.0 | HTTP bind address |
//! | `ABR_DATABASE_URL` | (none) | store connection string |
//! | `ABR_DATABASE_SSL` | false | relax certificate verification when true |
//! | `ABR_DB_POOL_MIN` / `ABR_DB_POOL_MAX` | 2 / 10 | serving-plane pool bounds |
//! | `ABR_CLUSTER_WORKERS` | 0 (= CPU count) | worker process count |
//! | `ABR_LOG_LEVEL` | info | `tracing` filter level |
//! | `ABR_ETL_BATCH_SIZE` | 5000 | Batch Writer flush threshold |
//! | `ABR_ETL_RETRY_ATTEMPTS` | 3 | Batch Writer retry attempts |
//! | `ABR_ETL_RETRY_DELAY_MS` | 1000 | Batch Writer base backoff |
//! | `ABR_ETL_FLUSH_DELAY_MS` | 200 | Batch Writer post-flush pacing delay |
//! | `ABR_ETL_POOL_IDLE_TIMEOUT_MS` | 240000 | idle-socket timeout in ingestion pool |
//! | `ABR_SEARCH_MAX_CANDIDATES` | 5000 | pagination cap (100..=50000) |
//! | `ABR_SEARCH_SHORT_QUERY_MAX_LENGTH` | 2 | short-term threshold |

use clap::Parser;

use abr_etl::BatchWriterConfig;
use abr_persistence::DatabaseConfig;

/// Server configuration for the ABR business search API.
///
/// Can be constructed from the process's command line and environment via
/// [`ServerConfig::parse`], from the environment alone via
/// [`ServerConfig::from_env`], or programmatically for tests via
/// [`ServerConfig::for_testing`].
#[derive(Debug, Clone, Parser)]
#[command(name = "abr-server")]
#[command(about = "ABR business search HTTP server")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(long, env = "ABR_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "ABR_SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Store connection string.
    #[arg(long, env = "ABR_DATABASE_URL", default_value = "")]
    pub database_url: String,

    /// Relax certificate verification (self-signed-friendly).
    #[arg(long, env = "ABR_DATABASE_SSL", default_value = "false")]
    pub database_ssl: bool,

    /// Serving-plane pool lower bound.
    #[arg(long, env = "ABR_DB_POOL_MIN", default_value = "2")]
    pub db_pool_min: usize,

    /// Serving-plane pool upper bound.
    #[arg(long, env = "ABR_DB_POOL_MAX", default_value = "10")]
    pub db_pool_max: usize,

    /// Worker process count. 0 means "CPU count" (§4.6.1).
    #[arg(long, env = "ABR_CLUSTER_WORKERS", default_value = "0")]
    pub cluster_workers: usize,

    /// `tracing` filter level.
    #[arg(long, env = "ABR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Batch Writer flush threshold.
    #[arg(long, env = "ABR_ETL_BATCH_SIZE", default_value = "5000")]
    pub etl_batch_size: usize,

    /// Batch Writer retry attempts.
    #[arg(long, env = "ABR_ETL_RETRY_ATTEMPTS", default_value = "3")]
    pub etl_retry_attempts: u32,

    /// Batch Writer base backoff, in milliseconds.
    #[arg(long, env = "ABR_ETL_RETRY_DELAY_MS", default_value = "1000")]
    pub etl_retry_delay_ms: u64,

    /// Batch Writer post-flush pacing delay, in milliseconds.
    #[arg(long, env = "ABR_ETL_FLUSH_DELAY_MS", default_value = "200")]
    pub etl_flush_delay_ms: u64,

    /// Idle-socket timeout for the ingestion pool, in milliseconds.
    #[arg(long, env = "ABR_ETL_POOL_IDLE_TIMEOUT_MS", default_value = "240000")]
    pub etl_pool_idle_timeout_ms: u64,

    /// Pagination cap, validated to `100..=50000`.
    #[arg(long, env = "ABR_SEARCH_MAX_CANDIDATES", default_value = "5000")]
    pub search_max_candidates: u64,

    /// Term length at or below which behavior may degrade to prefix-only.
    #[arg(long, env = "ABR_SEARCH_SHORT_QUERY_MAX_LENGTH", default_value = "2")]
    pub search_short_query_max_length: usize,

    /// Internal marker: set on the re-exec'd command line of a worker
    /// process, never by an operator (§4.6.1). Hidden from `--help`.
    #[arg(long, hide = true, default_value = "false")]
    pub worker: bool,

    /// Internal marker: the raw listening socket file descriptor a worker
    /// inherits from the primary. Hidden from `--help`.
    #[arg(long, hide = true)]
    pub fd: Option<i32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            database_url: String::new(),
            database_ssl: false,
            db_pool_min: 2,
            db_pool_max: 10,
            cluster_workers: 0,
            log_level: "info".to_string(),
            etl_batch_size: 5_000,
            etl_retry_attempts: 3,
            etl_retry_delay_ms: 1_000,
            etl_flush_delay_ms: 200,
            etl_pool_idle_timeout_ms: 240_000,
            search_max_candidates: 5_000,
            search_short_query_max_length: 2,
            worker: false,
            fd: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new `ServerConfig` from environment variables, without
    /// requiring command line arguments.
    pub fn from_env() -> Self {
        Self::try_parse_from(std::iter::once("abr-server".to_string())).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolves the worker process count, substituting the CPU count for 0.
    pub fn worker_count(&self) -> usize {
        if self.cluster_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.cluster_workers
        }
    }

    /// Validates the configuration and returns diagnostics if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.database_url.trim().is_empty() {
            errors.push("database_url (ABR_DATABASE_URL) must be set".to_string());
        }

        if self.db_pool_min == 0 {
            errors.push("db_pool_min cannot be 0".to_string());
        }

        if self.db_pool_min > self.db_pool_max {
            errors.push("db_pool_min cannot exceed db_pool_max".to_string());
        }

        if self.etl_batch_size == 0 {
            errors.push("etl_batch_size cannot be 0".to_string());
        }

        if !(100..=50_000).contains(&self.search_max_candidates) {
            errors.push("search_max_candidates must be between 100 and 50000".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing: ephemeral port,
    /// a small pagination cap, and no worker-process forking.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            cluster_workers: 1,
            search_max_candidates: 100,
            ..Default::default()
        }
    }

    /// Builds the serving-plane [`DatabaseConfig`].
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            ssl: self.database_ssl,
            pool_min: self.db_pool_min,
            pool_max: self.db_pool_max,
            idle_timeout_ms: None,
        }
    }

    /// Builds the ingestion-plane [`DatabaseConfig`]. A dedicated pool per
    /// run, sized at 1..4, never shared with the serving plane (§4.6.1, §5),
    /// recycling connections that have sat idle past `etl_pool_idle_timeout_ms`.
    pub fn ingestion_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            ssl: self.database_ssl,
            pool_min: 1,
            pool_max: 4,
            idle_timeout_ms: Some(self.etl_pool_idle_timeout_ms),
        }
    }

    /// Builds the [`BatchWriterConfig`] the ingestion orchestrator uses.
    pub fn batch_writer_config(&self) -> BatchWriterConfig {
        BatchWriterConfig {
            batch_size: self.etl_batch_size,
            retry_attempts: self.etl_retry_attempts,
            retry_delay_ms: self.etl_retry_delay_ms,
            flush_delay_ms: self.etl_flush_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.search_max_candidates, 5_000);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            host: "127.0.0.1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_worker_count_defaults_to_cpu_count() {
        let config = ServerConfig::default();
        assert_eq!(config.worker_count(), num_cpus::get().max(1));
    }

    #[test]
    fn test_worker_count_honors_explicit_value() {
        let config = ServerConfig {
            cluster_workers: 3,
            ..Default::default()
        };
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_validate_requires_database_url() {
        let config = ServerConfig::default();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().iter().any(|e| e.contains("database_url")));
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = ServerConfig {
            database_url: "postgres://localhost/abr".to_string(),
            port: 0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().iter().any(|e| e.contains("Port")));
    }

    #[test]
    fn test_validate_rejects_out_of_range_max_candidates() {
        let config = ServerConfig {
            database_url: "postgres://localhost/abr".to_string(),
            search_max_candidates: 50,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .iter()
                .any(|e| e.contains("search_max_candidates"))
        );
    }

    #[test]
    fn test_validate_accepts_well_formed_config() {
        let config = ServerConfig {
            database_url: "postgres://localhost/abr".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_testing() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.port, 0);
        assert_eq!(config.cluster_workers, 1);
    }
}
