//! Load peer config from file and environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Peer configuration. File: ~/.config/shoal/peer.toml or /etc/shoal/peer.toml.
/// Env overrides: SHOAL_TRACKER_ADDR, SHOAL_TRANSFER_PORT, SHOAL_SHARE_DIR.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tracker address (default 127.0.0.1:7860).
    #[serde(default = "default_tracker_addr")]
    pub tracker_addr: String,
    /// Transfer port, shared well-known value across all peers (default 7870).
    #[serde(default = "default_transfer_port")]
    pub transfer_port: u16,
    /// Directory holding the files this peer publishes (default ./shared).
    #[serde(default = "default_share_dir")]
    pub share_dir: PathBuf,
    /// Where fetched files are written (default current directory).
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Bound on each outbound connect/read/write, in seconds (default 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tracker_addr() -> String {
    "127.0.0.1:7860".to_owned()
}
fn default_transfer_port() -> u16 {
    shoal_core::TRANSFER_PORT
}
fn default_share_dir() -> PathBuf {
    PathBuf::from("shared")
}
fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracker_addr: default_tracker_addr(),
            transfer_port: default_transfer_port(),
            share_dir: default_share_dir(),
            download_dir: default_download_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn tracker(&self) -> anyhow::Result<SocketAddr> {
        self.tracker_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("tracker_addr {}: {e}", self.tracker_addr))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load config: explicit path if given, else first default path that exists,
/// else built-in defaults; then env vars on top. A file that exists but does
/// not parse is an error, not a silent fallback.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut c = match explicit {
        Some(path) => read_file(path)?,
        None => match config_paths().iter().find(|p| p.exists()) {
            Some(path) => read_file(path)?,
            None => Config::default(),
        },
    };
    if let Ok(s) = std::env::var("SHOAL_TRACKER_ADDR") {
        c.tracker_addr = s;
    }
    if let Ok(s) = std::env::var("SHOAL_TRANSFER_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.transfer_port = p;
        }
    }
    if let Ok(s) = std::env::var("SHOAL_SHARE_DIR") {
        c.share_dir = PathBuf::from(s);
    }
    Ok(c)
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read config {}: {e}", path.display()))?;
    toml::from_str(&s).map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/shoal/peer.toml"));
    }
    out.push(PathBuf::from("/etc/shoal/peer.toml"));
    out
}
