//! Shoal overlay protocol core.
//! No I/O; the tracker and peer daemons pass decoded requests in and write replies out.

pub mod directory;
pub mod processor;
pub mod protocol;
pub mod wire;

pub use directory::{Directory, FileEntry, PeerId};
pub use processor::{process, Processed};
pub use protocol::{Command, FileRecord, Reply, TransferRequest, TRANSFER_NOT_FOUND, TRANSFER_PORT};
pub use wire::{
    format_command, format_reply, format_transfer_request, parse_command, parse_reply,
    parse_transfer_request, CommandParseError, ReplyParseError, RequestParseError, MAX_LINE_LEN,
};
