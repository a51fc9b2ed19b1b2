//! The ABR business search HTTP serving shell (C6, §4.6).
//!
//! Each worker process builds one [`AppState`] around its own
//! [`abr_persistence::Repository`] and serves the four endpoints in §6.1
//! behind the middleware stack described in §4.6.2.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod process;
pub mod routing;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Creates the Axum application for one worker process.
///
/// Builds the router from [`routing::create_routes`] and layers the
/// request-timing, CORS, compression, body-limiting, and tracing middleware
/// described in §4.6.2. The error mapper is terminal: every handler returns
/// `Result<T, ApiError>` and `ApiError` implements `IntoResponse`.
pub fn create_app(state: AppState) -> Router {
    info!("Creating ABR business search API server");

    let router = routing::create_routes(state);

    let service_builder = ServiceBuilder::new()
        .layer(from_fn(middleware::record_arrival))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    router.layer(service_builder)
}

/// Runs one worker process to completion (§4.6.2, §4.6.5): builds the
/// `AppState` around its own `Repository` pool, serves on `listener` until
/// `SIGTERM`/`SIGINT`, drains in-flight requests, then returns once the
/// pool has been dropped.
pub async fn run_worker(config: ServerConfig, listener: std::net::TcpListener) -> anyhow::Result<()> {
    let database_config = config.database_config();
    let pool = database_config.build_pool()?;

    {
        let client = pool.get().await?;
        abr_persistence::schema::initialize(&client).await?;
    }

    let max_candidates = config.search_max_candidates;
    let repository = std::sync::Arc::new(abr_persistence::Repository::new(pool, max_candidates));
    let state = AppState::new(repository, config);
    let app = create_app(state);

    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    info!(pid = std::process::id(), "worker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(pid = std::process::id(), "worker drained, exiting");
    Ok(())
}

async fn shutdown_signal() {
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    let sigint = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    tokio::select! {
        _ = sigterm => {}
        _ = sigint => {}
    }
}

/// Initializes the `tracing` subscriber for logging.
///
/// Should be called once at process startup, before any other worker
/// activity.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("abr_server={level},abr_persistence={level},abr_etl={level},abr_ingest={level},tower_http=debug")));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
