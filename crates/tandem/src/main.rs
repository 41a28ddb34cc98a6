//! # tandem
//!
//! Shared countdown timer server binary: loads settings, initializes logging
//! and metrics, and runs the HTTP/WebSocket server until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tandem_server::config::ServerConfig;
use tandem_server::server::TandemServer;
use tandem_settings::{SettingsError, TandemSettings};

/// Tandem shared countdown timer server.
#[derive(Parser, Debug)]
#[command(name = "tandem", about = "Shared countdown timer server")]
struct Cli {
    /// Settings file (defaults to `~/.tandem/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn server_config(&self, settings: &TandemSettings) -> ServerConfig {
        let mut config = ServerConfig::from(settings);
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config
    }
}

/// Load settings. When the file is unusable, fall back to defaults with the
/// `TANDEM_*` overrides still applied.
fn load_settings(path: Option<&PathBuf>) -> (TandemSettings, Option<SettingsError>) {
    let path = path.cloned().unwrap_or_else(tandem_settings::settings_path);
    match tandem_settings::load_settings_from_path(&path) {
        Ok(settings) => (settings, None),
        Err(e) => (tandem_settings::defaults_with_env(), Some(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: they pick the log level.
    let (settings, settings_error) = load_settings(args.settings.as_ref());
    tandem_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    if let Some(e) = settings_error {
        tracing::warn!(error = %e, "failed to load settings file, using defaults and environment");
    }

    let metrics = tandem_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = args.server_config(&settings);
    let server = TandemServer::new(config, metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Tandem listening on http://{addr} (ws://{addr}/ws)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let report = server.shutdown().graceful_shutdown(handle, None).await;
    tracing::info!(clean = report.is_clean(), "Shutdown complete");
    Ok(())
}
