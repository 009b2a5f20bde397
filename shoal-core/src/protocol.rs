//! Tracker wire vocabulary: commands, replies, and transfer requests.

use std::net::IpAddr;

/// Well-known TCP port every peer serves ranged transfers on. Distinct from the tracker port.
pub const TRANSFER_PORT: u16 = 7870;

/// Literal body a transfer server sends when the requested file is absent.
/// The transfer response carries no framing, so this is the one reserved body.
pub const TRANSFER_NOT_FOUND: &[u8] = b"FILENOTFOUND";

/// One tracker command, decoded from a single request line (see wire module).
/// The requesting peer's identity comes from the connection, never from the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register the connecting peer with an empty file list.
    Join,
    /// Report every published file across all peers.
    ListFiles,
    /// Publish a file under the connecting peer.
    CreateFile { filename: String, size: u64 },
    /// Withdraw a file published by the connecting peer.
    DeleteFile { filename: String },
    /// Find every peer publishing `filename`.
    Search { filename: String },
    /// Deregister the connecting peer and everything it published.
    Leave,
}

/// One published file as reported by SEARCH and LISTFILES.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub filename: String,
    pub peer: IpAddr,
    pub size: u64,
}

/// Tracker reply. Textual on the wire; `Records` renders one `FILE <name> <peer> <size>` line per match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    ConfirmJoin,
    ClientAlreadyConnected,
    ConfirmCreateFile,
    FileAlreadyExists,
    ConfirmDeleteFile,
    FileNotFound,
    Records(Vec<FileRecord>),
    NoFiles,
    ConfirmLeave,
    ClientNotFound,
    UnknownCommand,
    InvalidCommand,
}

/// Byte window a remote peer wants from a local file. `end` absent means to end-of-file.
/// Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub filename: String,
    pub start: u64,
    pub end: Option<u64>,
}
