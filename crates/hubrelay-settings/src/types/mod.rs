//! Settings types.

mod logging;
mod server;

pub use logging::{LogFormat, LoggingSettings};
pub use server::ServerSettings;

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// HTTP / WebSocket server settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}
