//! Shoal peer: ranged transfer server plus the tracker-facing command front end.

mod client;
mod config;
mod transfer;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "shoal-peer", version, about = "Peer daemon and CLI for the shoal overlay")]
struct Args {
    /// Config file (default: ~/.config/shoal/peer.toml, then /etc/shoal/peer.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Serve ranged transfers of the files under the share root.
    Serve,
    /// Register this peer with the tracker.
    Join,
    /// Deregister this peer and withdraw its files.
    Leave,
    /// Reconcile the share root with the tracker's view of this peer.
    Refresh,
    /// List every file published on the overlay.
    List,
    /// Find which peers publish a file.
    Search { filename: String },
    /// Fetch a byte range of a file from a peer.
    Get {
        peer: IpAddr,
        filename: String,
        /// First byte offset (default 0).
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// One-past-last byte offset; omit to read to end of file.
        #[arg(long)]
        end: Option<u64>,
        /// Destination path (default: download dir + filename).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let tracker = cfg.tracker()?;
    let limit = cfg.timeout();

    match args.command {
        Cmd::Serve => {
            let listener = TcpListener::bind(("0.0.0.0", cfg.transfer_port))
                .await
                .with_context(|| format!("bind transfer port {}", cfg.transfer_port))?;
            info!(port = cfg.transfer_port, root = %cfg.share_dir.display(), "transfer server listening");
            tokio::select! {
                r = transfer::run(listener, cfg.share_dir.clone()) => r.context("transfer server")?,
                _ = shutdown_signal() => info!("shutting down"),
            }
        }
        Cmd::Join => {
            let reply = client::join(tracker, limit).await?;
            println!("{}", shoal_core::format_reply(&reply));
        }
        Cmd::Leave => {
            let reply = client::leave(tracker, limit).await?;
            println!("{}", shoal_core::format_reply(&reply));
        }
        Cmd::Refresh => {
            let report = client::refresh(tracker, limit, &cfg.share_dir).await?;
            println!(
                "published {} file(s), withdrew {}",
                report.published.len(),
                report.withdrawn.len()
            );
        }
        Cmd::List => {
            for r in client::list(tracker, limit).await? {
                println!("{}\t{}\t{} bytes", r.filename, r.peer, r.size);
            }
        }
        Cmd::Search { filename } => {
            let records = client::search(tracker, limit, &filename).await?;
            if records.is_empty() {
                println!("no peer publishes {filename}");
            }
            for r in records {
                println!("{}\t{}\t{} bytes", r.filename, r.peer, r.size);
            }
        }
        Cmd::Get {
            peer,
            filename,
            start,
            end,
            output,
        } => {
            let dest = output.unwrap_or_else(|| cfg.download_dir.join(&filename));
            let n = client::get(
                tracker,
                limit,
                peer,
                cfg.transfer_port,
                &filename,
                start,
                end,
                &dest,
            )
            .await?;
            println!("wrote {n} bytes to {}", dest.display());
        }
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
