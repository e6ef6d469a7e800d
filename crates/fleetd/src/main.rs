//! fleetd: the fleetgrid daemon.
//!
//! Single binary that assembles the orchestrator:
//! - Fleet configuration (TOML)
//! - Lifecycle coordinator with heartbeat and capacity control
//! - Process launcher for game servers
//! - JSON-lines ingress for servers and proxies
//! - Admin REST API
//!
//! # Usage
//!
//! ```text
//! fleetd run --config /etc/fleetgrid/fleet.toml --ingress 0.0.0.0:7400 --admin 0.0.0.0:7401
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use fleetd::daemon::{self, DaemonOptions};

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleetgrid game-server orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator.
    Run {
        /// Fleet configuration file.
        #[arg(long, default_value = "fleet.toml")]
        config: PathBuf,

        /// Address servers and proxies connect to.
        #[arg(long, default_value = "0.0.0.0:7400")]
        ingress: SocketAddr,

        /// Address of the admin REST API.
        #[arg(long, default_value = "127.0.0.1:7401")]
        admin: SocketAddr,

        /// Log output format.
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,

        /// Do not start the default set on boot.
        #[arg(long)]
        no_default_set: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleetd=debug,fleetgrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            ingress,
            admin,
            log_format,
            no_default_set,
        } => {
            init_tracing(log_format);
            daemon::run(DaemonOptions {
                config,
                ingress,
                admin,
                default_set: !no_default_set,
            })
            .await
        }
    }
}
