//! Tracker directory: which peer publishes which files.
//! Owned state, no locking of its own; callers serialize access.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::protocol::FileRecord;

/// Peer identity: the address the tracker sees the peer connect from.
/// The sole directory key; the transfer port is well-known and not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub IpAddr);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One published file. Filenames are opaque strings, unique within a peer, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
}

/// Mapping from peer to its published files; the single source of truth for
/// "who has what". Ordered so the persisted snapshot stays stable and diffable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Directory {
    peers: BTreeMap<PeerId, Vec<FileEntry>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_peer(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    /// Register a peer with an empty file list. Returns false if it is already present.
    pub fn join(&mut self, peer: PeerId) -> bool {
        if self.peers.contains_key(&peer) {
            return false;
        }
        self.peers.insert(peer, Vec::new());
        true
    }

    /// Remove a peer and everything it published. Returns false if it was not present.
    pub fn leave(&mut self, peer: PeerId) -> bool {
        self.peers.remove(&peer).is_some()
    }

    /// Append an entry to a joined peer's list. Returns false if the peer already
    /// publishes that filename. The peer must be present (`contains_peer`).
    pub fn publish(&mut self, peer: PeerId, entry: FileEntry) -> bool {
        let files = match self.peers.get_mut(&peer) {
            Some(files) => files,
            None => return false,
        };
        if files.iter().any(|f| f.filename == entry.filename) {
            return false;
        }
        files.push(entry);
        true
    }

    /// Remove a peer's entry by filename. Returns false if no such entry exists.
    pub fn withdraw(&mut self, peer: PeerId, filename: &str) -> bool {
        let files = match self.peers.get_mut(&peer) {
            Some(files) => files,
            None => return false,
        };
        let before = files.len();
        files.retain(|f| f.filename != filename);
        files.len() < before
    }

    /// Every `(peer, size)` match for `filename` across all peers.
    pub fn search(&self, filename: &str) -> Vec<FileRecord> {
        self.peers
            .iter()
            .flat_map(|(peer, files)| {
                files
                    .iter()
                    .filter(|f| f.filename == filename)
                    .map(|f| FileRecord {
                        filename: f.filename.clone(),
                        peer: peer.0,
                        size: f.size,
                    })
            })
            .collect()
    }

    /// Every published file across all peers.
    pub fn all_files(&self) -> Vec<FileRecord> {
        self.peers
            .iter()
            .flat_map(|(peer, files)| {
                files.iter().map(|f| FileRecord {
                    filename: f.filename.clone(),
                    peer: peer.0,
                    size: f.size,
                })
            })
            .collect()
    }

    /// Files published by one peer, if it is present.
    pub fn files_of(&self, peer: PeerId) -> Option<&[FileEntry]> {
        self.peers.get(&peer).map(Vec::as_slice)
    }
}
