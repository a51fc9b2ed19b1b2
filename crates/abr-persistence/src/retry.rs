//! Transient-failure classification (§4.3.3).
//!
//! A batch is retried only when the underlying failure looks like a dropped
//! connection rather than a real data problem: retrying a constraint
//! violation or a malformed statement would just fail again, identically,
//! three more times.

use std::error::Error as StdError;
use std::io;

/// PostgreSQL admin-shutdown SQLSTATE (e.g. the server restarting mid-query).
const ADMIN_SHUTDOWN_SQLSTATE: &str = "57P01";

/// Returns true if `err` is a transient connection failure that's worth
/// retrying with backoff, per §4.3.3.
pub fn is_transient(err: &tokio_postgres::Error) -> bool {
    if let Some(code) = err.code() {
        if code.code() == ADMIN_SHUTDOWN_SQLSTATE {
            return true;
        }
    }

    if io_error_is_transient(err) {
        return true;
    }

    message_looks_transient(&err.to_string())
}

fn io_error_is_transient(err: &tokio_postgres::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

fn message_looks_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("connection terminated")
        || lower.contains("connection closed")
        || lower.contains("connection reset")
        || lower.contains("timeout acquiring a connection")
}

/// Also classifies pool-acquisition errors, which never carry a
/// `tokio_postgres::Error` — the pool itself timed out before reaching Postgres.
pub fn pool_error_is_transient(err: &deadpool_postgres::PoolError) -> bool {
    message_looks_transient(&err.to_string())
}
