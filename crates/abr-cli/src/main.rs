//! Offline seed CLI.
//!
//! Drives the same [`abr_ingest::spawn_ingestion`] entry point the HTTP
//! `/api/v1/ingest` handler uses, so a human operator can seed a store from
//! a local ABR XML export without standing up the server. Progress
//! reporting is cosmetic: human-readable counters to stdout, not a
//! machine-readable output contract.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use abr_etl::BatchWriterConfig;
use abr_ingest::{spawn_ingestion, IngestEvent, IngestRequest};
use abr_persistence::DatabaseConfig;

/// Seeds a PostgreSQL store from an ABR bulk-extract XML file.
#[derive(Debug, Parser)]
#[command(name = "abr-seed")]
#[command(about = "Seed the ABR business search store from a bulk-extract XML file")]
struct Args {
    /// Path to the ABR XML export to ingest.
    #[arg(long)]
    file: PathBuf,

    /// Store connection string.
    #[arg(long, env = "ABR_DATABASE_URL")]
    database_url: String,

    /// Relax certificate verification when connecting over TLS.
    #[arg(long, env = "ABR_DATABASE_SSL", default_value = "false")]
    database_ssl: bool,

    /// Batch Writer flush threshold.
    #[arg(long, env = "ABR_ETL_BATCH_SIZE", default_value = "5000")]
    batch_size: usize,

    /// Batch Writer retry attempts on transient connection failures.
    #[arg(long, env = "ABR_ETL_RETRY_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,

    /// Batch Writer base backoff, in milliseconds.
    #[arg(long, env = "ABR_ETL_RETRY_DELAY_MS", default_value = "1000")]
    retry_delay_ms: u64,

    /// Batch Writer post-flush pacing delay, in milliseconds.
    #[arg(long, env = "ABR_ETL_FLUSH_DELAY_MS", default_value = "200")]
    flush_delay_ms: u64,

    /// How long an ingestion-pool connection may sit idle before recycling.
    #[arg(long, env = "ABR_ETL_POOL_IDLE_TIMEOUT_MS", default_value = "240000")]
    pool_idle_timeout_ms: u64,

    /// `tracing` filter level.
    #[arg(long, env = "ABR_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("abr_cli={level},abr_etl={level},abr_ingest={level}")));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.database_url.trim().is_empty() {
        eprintln!("Configuration error: --database-url (or ABR_DATABASE_URL) must be set");
        std::process::exit(1);
    }

    if !args.file.exists() {
        eprintln!("Configuration error: --file {} does not exist", args.file.display());
        std::process::exit(1);
    }

    println!("Seeding from {}", args.file.display());

    let request = IngestRequest {
        file_path: args.file.clone(),
        database: DatabaseConfig {
            url: args.database_url,
            ssl: args.database_ssl,
            pool_min: 1,
            pool_max: 4,
            idle_timeout_ms: Some(args.pool_idle_timeout_ms),
        },
        writer: BatchWriterConfig {
            batch_size: args.batch_size,
            retry_attempts: args.retry_attempts,
            retry_delay_ms: args.retry_delay_ms,
            flush_delay_ms: args.flush_delay_ms,
        },
    };

    info!(file = %args.file.display(), "starting ingestion run");
    let rx = spawn_ingestion(request);

    loop {
        match rx.recv() {
            Ok(IngestEvent::Progress { processed }) => {
                println!("  ...{processed} records processed");
            }
            Ok(IngestEvent::Done {
                total_processed,
                total_inserted,
                total_updated,
                duration_ms,
            }) => {
                println!(
                    "Done: {total_processed} processed, {total_inserted} inserted, \
                     {total_updated} updated, in {duration_ms}ms"
                );
                return Ok(());
            }
            Ok(IngestEvent::Error { message }) => {
                eprintln!("Ingestion failed: {message}");
                std::process::exit(1);
            }
            Err(_) => {
                eprintln!("Ingestion thread exited without a terminal event");
                std::process::exit(1);
            }
        }
    }
}
