//! # hubrelay
//!
//! Relay binary: loads settings and the shared secret, then serves webhook
//! ingress and the subscriber `WebSocket` until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hubrelay_server::{RelayServer, ServerConfig};
use hubrelay_settings::RelaySettings;

/// Webhook-to-WebSocket relay.
#[derive(Parser, Debug)]
#[command(name = "hubrelay", about = "Webhook-to-WebSocket relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.hubrelay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(hubrelay_settings::settings_path);
    let mut settings = hubrelay_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    hubrelay_logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let secret = hubrelay_settings::load_secret().context("Failed to load shared secret")?;
    let metrics = hubrelay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let shutdown_timeout = config.shutdown_timeout;
    let server = RelayServer::new(config, secret).with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind listener")?;
    tracing::info!(%addr, "hubrelay started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], shutdown_timeout)
        .await;
    Ok(())
}
