//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before anything is recorded. The returned handle
/// renders the `/metrics` body.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Webhook deliveries (counter, labels: outcome).
pub const WEBHOOK_REQUESTS_TOTAL: &str = "webhook_requests_total";
/// Admitted WebSocket subscribers (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Currently registered subscribers (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Refused WebSocket upgrades (counter, labels: reason).
pub const WS_REJECTIONS_TOTAL: &str = "ws_rejections_total";
/// Messages fanned out (counter).
pub const BROADCAST_MESSAGES_TOTAL: &str = "broadcast_messages_total";
/// Subscribers evicted during fan-out (counter).
pub const BROADCAST_EVICTIONS_TOTAL: &str = "broadcast_evictions_total";
