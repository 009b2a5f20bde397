//! Shoal tracker daemon: serves the directory protocol over TCP.

mod config;
mod server;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "shoal-tracker", version, about = "Directory tracker for the shoal overlay")]
struct Args {
    /// Config file (default: ~/.config/shoal/tracker.toml, then /etc/shoal/tracker.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        cfg.listen_port = port;
    }

    let store = store::SnapshotStore::new(cfg.snapshot_path.clone());
    let directory = store
        .load()
        .with_context(|| format!("load snapshot {}", cfg.snapshot_path.display()))?;

    let bind = format!("{}:{}", cfg.listen_addr, cfg.listen_port);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(addr = %bind, snapshot = %cfg.snapshot_path.display(), "tracker listening");

    let state = Arc::new(Mutex::new(server::TrackerState { directory, store }));
    tokio::select! {
        r = server::run(listener, state) => r.context("tracker server")?,
        _ = shutdown_signal() => info!("shutting down"),
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
