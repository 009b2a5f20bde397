//! Outbound operations: tracker directory calls and ranged transfers.
//! Every connect/read/write is bounded by a timeout; a hung remote surfaces
//! as its own failure, never a silent stall.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use shoal_core::{
    format_command, format_transfer_request, parse_reply, Command, FileRecord, Reply,
    ReplyParseError, TransferRequest, MAX_LINE_LEN, TRANSFER_NOT_FOUND,
};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Failure of one outbound operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    BadReply(#[from] ReplyParseError),
    #[error("unexpected reply {0:?}")]
    UnexpectedReply(Reply),
    #[error("{filename} is not published by {peer}")]
    NotPublished { filename: String, peer: IpAddr },
    #[error("remote peer does not have {0}")]
    RemoteMissing(String),
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::TimedOut(limit)),
    }
}

/// One open tracker connection. The protocol keeps a connection open across
/// commands: one line out, one bounded reply read per exchange.
pub struct TrackerSession {
    stream: TcpStream,
    limit: Duration,
}

impl TrackerSession {
    pub async fn connect(tracker: SocketAddr, limit: Duration) -> Result<Self, ClientError> {
        let stream = bounded(limit, TcpStream::connect(tracker)).await?;
        Ok(Self { stream, limit })
    }

    /// The address the tracker keys this peer's directory entries by.
    pub fn identity(&self) -> Result<IpAddr, ClientError> {
        Ok(self.stream.local_addr()?.ip())
    }

    /// Send one command, read one reply block. Replies have no length prefix;
    /// the read is a single bounded buffer.
    pub async fn exchange(&mut self, cmd: &Command) -> Result<Reply, ClientError> {
        let mut line = format_command(cmd);
        line.push('\n');
        bounded(self.limit, self.stream.write_all(line.as_bytes())).await?;
        let mut buf = vec![0u8; MAX_LINE_LEN];
        let n = bounded(self.limit, self.stream.read(&mut buf)).await?;
        if n == 0 {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "tracker closed the connection",
            )));
        }
        let text = String::from_utf8_lossy(&buf[..n]);
        Ok(parse_reply(&text)?)
    }
}

/// Register this peer with the tracker. A CLIENTALREADYCONNECTED reply is
/// returned to the caller, who decides whether it matters.
pub async fn join(tracker: SocketAddr, limit: Duration) -> Result<Reply, ClientError> {
    let mut session = TrackerSession::connect(tracker, limit).await?;
    session.exchange(&Command::Join).await
}

/// Deregister this peer and withdraw everything it published.
pub async fn leave(tracker: SocketAddr, limit: Duration) -> Result<Reply, ClientError> {
    let mut session = TrackerSession::connect(tracker, limit).await?;
    session.exchange(&Command::Leave).await
}

/// Every file published on the overlay. NOFILES comes back as an empty list.
pub async fn list(tracker: SocketAddr, limit: Duration) -> Result<Vec<FileRecord>, ClientError> {
    let mut session = TrackerSession::connect(tracker, limit).await?;
    match session.exchange(&Command::ListFiles).await? {
        Reply::Records(records) => Ok(records),
        Reply::NoFiles => Ok(Vec::new()),
        other => Err(ClientError::UnexpectedReply(other)),
    }
}

/// Every peer publishing `filename`. A miss is an empty list, not a fault.
pub async fn search(
    tracker: SocketAddr,
    limit: Duration,
    filename: &str,
) -> Result<Vec<FileRecord>, ClientError> {
    let mut session = TrackerSession::connect(tracker, limit).await?;
    let cmd = Command::Search {
        filename: filename.to_owned(),
    };
    match session.exchange(&cmd).await? {
        Reply::Records(records) => Ok(records),
        Reply::FileNotFound => Ok(Vec::new()),
        other => Err(ClientError::UnexpectedReply(other)),
    }
}

/// What a refresh changed at the tracker.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub published: Vec<String>,
    pub withdrawn: Vec<String>,
}

/// Reconcile the share root with the tracker's view of this peer: publish
/// files the tracker is missing, withdraw files that are gone locally. The
/// peer must have joined; a CLIENTNOTFOUND reply surfaces as UnexpectedReply.
pub async fn refresh(
    tracker: SocketAddr,
    limit: Duration,
    share_root: &Path,
) -> Result<RefreshReport, ClientError> {
    let mut session = TrackerSession::connect(tracker, limit).await?;
    let identity = session.identity()?;

    let listed = match session.exchange(&Command::ListFiles).await? {
        Reply::Records(records) => records,
        Reply::NoFiles => Vec::new(),
        other => return Err(ClientError::UnexpectedReply(other)),
    };
    let tracker_view: Vec<String> = listed
        .into_iter()
        .filter(|r| r.peer == identity)
        .map(|r| r.filename)
        .collect();

    let mut local: Vec<(String, u64)> = Vec::new();
    let mut entries = fs::read_dir(share_root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            local.push((name, meta.len()));
        }
    }

    let mut report = RefreshReport::default();
    for (name, size) in &local {
        if tracker_view.contains(name) {
            continue;
        }
        let cmd = Command::CreateFile {
            filename: name.clone(),
            size: *size,
        };
        match session.exchange(&cmd).await? {
            Reply::ConfirmCreateFile => report.published.push(name.clone()),
            // Someone (or a previous run) got there first; the view was stale.
            Reply::FileAlreadyExists => debug!(file = %name, "already published"),
            other => return Err(ClientError::UnexpectedReply(other)),
        }
    }
    for name in &tracker_view {
        if local.iter().any(|(n, _)| n == name) {
            continue;
        }
        let cmd = Command::DeleteFile {
            filename: name.clone(),
        };
        match session.exchange(&cmd).await? {
            Reply::ConfirmDeleteFile => report.withdrawn.push(name.clone()),
            Reply::FileNotFound => debug!(file = %name, "already withdrawn"),
            other => return Err(ClientError::UnexpectedReply(other)),
        }
    }
    Ok(report)
}

/// Fetch a byte window of `filename` from `peer`, streaming it into `dest`.
/// Confirms via SEARCH first that the peer is known to publish the file; the
/// check is advisory and the transfer server stays the authority. Returns the
/// number of bytes written.
#[allow(clippy::too_many_arguments)]
pub async fn get(
    tracker: SocketAddr,
    limit: Duration,
    peer: IpAddr,
    transfer_port: u16,
    filename: &str,
    start: u64,
    end: Option<u64>,
    dest: &Path,
) -> Result<u64, ClientError> {
    let known = search(tracker, limit, filename).await?;
    if !known.iter().any(|r| r.peer == peer) {
        return Err(ClientError::NotPublished {
            filename: filename.to_owned(),
            peer,
        });
    }

    let mut stream = bounded(limit, TcpStream::connect((peer, transfer_port))).await?;
    let request = TransferRequest {
        filename: filename.to_owned(),
        start,
        end,
    };
    let mut line = format_transfer_request(&request);
    line.push('\n');
    bounded(limit, stream.write_all(line.as_bytes())).await?;

    // Stream to the destination until the remote closes. The first bytes are
    // kept aside so a whole-body FILENOTFOUND sentinel can be told apart from
    // file content.
    let mut file = fs::File::create(dest).await?;
    let mut head: Vec<u8> = Vec::with_capacity(TRANSFER_NOT_FOUND.len() + 1);
    let mut total: u64 = 0;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = bounded(limit, stream.read(&mut buf)).await?;
        if n == 0 {
            break;
        }
        if head.len() <= TRANSFER_NOT_FOUND.len() {
            let want = (TRANSFER_NOT_FOUND.len() + 1).saturating_sub(head.len());
            head.extend_from_slice(&buf[..n.min(want)]);
        }
        file.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    file.flush().await?;
    drop(file);

    if total == TRANSFER_NOT_FOUND.len() as u64 && head == TRANSFER_NOT_FOUND {
        let _ = fs::remove_file(dest).await;
        return Err(ClientError::RemoteMissing(filename.to_owned()));
    }
    debug!(file = %filename, bytes = total, "transfer complete");
    Ok(total)
}
