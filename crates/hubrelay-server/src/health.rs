//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server runs.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Currently registered subscribers.
    pub subscribers: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, subscribers: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        subscribers,
    }
}
