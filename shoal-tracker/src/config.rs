//! Load tracker config from file and environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Tracker configuration. File: ~/.config/shoal/tracker.toml or /etc/shoal/tracker.toml.
/// Env overrides: SHOAL_TRACKER_PORT, SHOAL_TRACKER_SNAPSHOT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listen address (default 0.0.0.0).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Listen port (default 7860).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Directory snapshot path (default tracker_directory.json in the working directory).
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_owned()
}
fn default_listen_port() -> u16 {
    7860
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("tracker_directory.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            snapshot_path: default_snapshot_path(),
        }
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
    if let Ok(s) = std::env::var("SHOAL_TRACKER_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.listen_port = p;
        }
    }
    if let Ok(s) = std::env::var("SHOAL_TRACKER_SNAPSHOT") {
        c.snapshot_path = PathBuf::from(s);
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
        out.push(h.join(".config/shoal/tracker.toml"));
    }
    out.push(PathBuf::from("/etc/shoal/tracker.toml"));
    out
}
