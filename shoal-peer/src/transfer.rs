//! Transfer server: ranged GET over the published share root.
//! Serves one request per connection; the byte range goes out raw and the
//! close signals end of stream.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use shoal_core::{parse_transfer_request, RequestParseError, MAX_LINE_LEN, TRANSFER_NOT_FOUND};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Accept loop. Each connection is one ranged request; a bad request costs
/// only its own task, never the listener.
pub async fn run(listener: TcpListener, share_root: PathBuf) -> io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let root = share_root.clone();
                tokio::spawn(async move {
                    match handle_request(stream, &root).await {
                        Ok(()) => debug!(%addr, "transfer done"),
                        Err(e) => warn!(%addr, error = %e, "transfer refused"),
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Serve one `GET <filename> <offset_start> [offset_end]` request.
/// On any malformed or forbidden request the connection closes with nothing
/// written; a missing file gets the FILENOTFOUND sentinel body.
async fn handle_request(mut stream: TcpStream, share_root: &Path) -> Result<(), TransferError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(());
    }
    if line.len() > MAX_LINE_LEN {
        return Err(TransferError::RequestTooLong);
    }
    let req = parse_transfer_request(line.trim())?;
    if !is_safe_filename(&req.filename) {
        return Err(TransferError::Forbidden(req.filename));
    }

    // Confined to the share root: the filename is a bare name by now.
    let path = share_root.join(&req.filename);
    let mut file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            write_half.write_all(TRANSFER_NOT_FOUND).await?;
            write_half.shutdown().await?;
            return Ok(());
        }
        Err(e) => return Err(TransferError::Io(e)),
    };

    let len = file.metadata().await?.len();
    if req.start > len {
        return Err(TransferError::StartBeyondEof {
            start: req.start,
            len,
        });
    }
    // An end past end-of-file is clamped; inverted ranges were rejected at parse.
    let end = req.end.map_or(len, |e| e.min(len));

    file.seek(SeekFrom::Start(req.start)).await?;
    let mut window = file.take(end - req.start);
    tokio::io::copy(&mut window, &mut write_half).await?;
    write_half.shutdown().await?;
    Ok(())
}

/// Published filenames are bare names inside the share root. Anything with a
/// path separator or a dot-segment never reaches the filesystem.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

/// Error serving one transfer request.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("request line too long")]
    RequestTooLong,
    #[error(transparent)]
    Malformed(#[from] RequestParseError),
    #[error("filename escapes the share root: {0}")]
    Forbidden(String),
    #[error("start offset {start} beyond end of file ({len} bytes)")]
    StartBeyondEof { start: u64, len: u64 },
}
