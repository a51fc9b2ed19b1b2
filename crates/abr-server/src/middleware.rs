//! Request-timing middleware (§4.6.2): a first-and-last layer that records
//! wall-clock arrival so handlers can compute `total_time_ms` for the
//! response envelope (§4.6.4).
//!
//! Written as an `axum::middleware::from_fn` function.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Wall-clock arrival time, stashed in request extensions so handlers can
/// read it back without threading it through every function signature.
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub Instant);

/// Stamps the request with its arrival time before dispatch.
pub async fn record_arrival(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestStart(Instant::now()));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_start_elapsed_grows_monotonically() {
        let start = RequestStart(Instant::now());
        std::thread::sleep(std::time::Duration::from_millis(1));
        assert!(start.0.elapsed().as_millis() >= 1);
    }
}
