//! Server network and session settings.

use serde::{Deserialize, Serialize};

/// Server network and subscriber-session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` for auto-assign).
    pub port: u16,
    /// Path of the subscriber WebSocket endpoint.
    pub ws_path: String,
    /// Upper bound on concurrently registered subscribers.
    pub max_subscribers: usize,
    /// Frames buffered per subscriber before it is evicted.
    pub subscriber_queue_capacity: usize,
    /// Interval between server-initiated Ping frames, in seconds.
    pub ping_interval_secs: u64,
    /// Close a session after this long without inbound frames, in seconds.
    pub idle_timeout_secs: u64,
    /// Largest accepted webhook body, in bytes.
    pub max_body_bytes: usize,
    /// Grace period for in-flight work at shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/v1/ws".to_string(),
            max_subscribers: 1024,
            subscriber_queue_capacity: 64,
            ping_interval_secs: 30,
            idle_timeout_secs: 90,
            max_body_bytes: 1024 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}
