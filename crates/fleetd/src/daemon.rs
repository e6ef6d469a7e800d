//! Daemon mode: wires the coordinator to the ingress, launcher, and API.
//!
//! In this mode, the daemon:
//! 1. Loads `fleet.toml` (or falls back to built-in defaults)
//! 2. Builds the coordinator over a process launcher and channel transport
//! 3. Serves the JSON-lines ingress and the admin REST API
//! 4. Optionally starts the default set
//! 5. On Ctrl-C, stops the fleet and waits for it to drain

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use fleet_core::FleetConfig;
use fleetgrid_scheduler::{ChannelTransport, Coordinator};

use crate::ingress::{self, Hub};
use crate::launcher::{LauncherConfig, ProcessLauncher};

/// How long shutdown waits for the fleet to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(120);

pub struct DaemonOptions {
    pub config: PathBuf,
    pub ingress: SocketAddr,
    pub admin: SocketAddr,
    pub default_set: bool,
}

/// Daemon-only sections of `fleet.toml`.
#[derive(Debug, Default, Deserialize)]
struct DaemonFile {
    #[serde(default)]
    launcher: LauncherConfig,
}

/// Load the fleet and launcher configuration.
///
/// A missing file is not an error: every setting has a default.
pub fn load_config(path: &Path) -> anyhow::Result<(FleetConfig, LauncherConfig)> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok((FleetConfig::default(), LauncherConfig::default()));
    }
    let content = FleetConfig::read_source(path)?;
    let fleet = FleetConfig::parse(&content)?;
    let daemon: DaemonFile = toml::from_str(&content)?;
    Ok((fleet, daemon.launcher))
}

/// Run the daemon until Ctrl-C.
pub async fn run(options: DaemonOptions) -> anyhow::Result<()> {
    info!("fleetgrid daemon starting");

    // ── Configuration ────────────────────────────────────────────
    let (config, launcher_config) = load_config(&options.config)?;
    info!(
        path = %options.config.display(),
        ram_budget_mb = config.network.ram_budget_mb,
        "configuration loaded"
    );

    // ── Coordinator ──────────────────────────────────────────────
    let launcher = Arc::new(ProcessLauncher::new(launcher_config));
    let (transport, outbound) = ChannelTransport::new();
    let coordinator = Coordinator::new(config, launcher, Arc::new(transport));
    info!("coordinator initialized");

    // ── Ingress ──────────────────────────────────────────────────
    let hub = Hub::new(Arc::clone(&coordinator));
    let pump_handle = tokio::spawn(ingress::pump(Arc::clone(&hub), outbound));

    let ingress_listener = tokio::net::TcpListener::bind(options.ingress).await?;
    info!(addr = %options.ingress, "ingress listening");
    let ingress_handle = tokio::spawn(ingress::serve(ingress_listener, Arc::clone(&hub)));

    if options.default_set {
        let created = coordinator.start_default_set();
        info!(count = created.len(), "default set queued");
    }

    // ── Admin API ────────────────────────────────────────────────
    let router = fleetgrid_api::build_router(Arc::clone(&coordinator));
    info!(addr = %options.admin, "admin API starting");
    let listener = tokio::net::TcpListener::bind(options.admin).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    });
    server.await?;

    // ── Drain ────────────────────────────────────────────────────
    let stopping = coordinator.shutdown_all();
    info!(instances = stopping, "stopping fleet");
    let drained = coordinator.drain(DRAIN_TIMEOUT).await;

    ingress_handle.abort();
    pump_handle.abort();

    info!(drained, "fleetgrid daemon stopped");
    Ok(())
}
