//! Server configuration.

use std::time::Duration;

use hubrelay_settings::ServerSettings;

/// Runtime configuration of a [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Path of the subscriber WebSocket endpoint.
    pub ws_path: String,
    /// Maximum concurrently registered subscribers.
    pub max_subscribers: usize,
    /// Frames buffered per subscriber before eviction.
    pub queue_capacity: usize,
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
    /// Close a session after this long without inbound frames.
    pub idle_timeout: Duration,
    /// Largest accepted webhook body in bytes.
    pub max_body_bytes: usize,
    /// Grace period for in-flight work at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ws_path: "/v1/ws".into(),
            max_subscribers: 1024,
            queue_capacity: 64,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
            max_body_bytes: 1024 * 1024,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            ws_path: settings.ws_path.clone(),
            max_subscribers: settings.max_subscribers,
            queue_capacity: settings.subscriber_queue_capacity,
            ping_interval: Duration::from_secs(settings.ping_interval_secs),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            max_body_bytes: settings.max_body_bytes,
            shutdown_timeout: Duration::from_secs(settings.shutdown_timeout_secs),
        }
    }
}
