//! Connection server: one task per inbound connection, directory behind one lock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shoal_core::{
    format_reply, parse_command, process, Command, CommandParseError, Directory, PeerId, Reply,
    MAX_LINE_LEN,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::store::SnapshotStore;

/// Directory plus its snapshot store. One lock guards both, so a mutating
/// command's read-check-mutate-flush sequence is a single transaction and two
/// concurrent CREATEFILEs for the same (peer, filename) can never both observe
/// "absent".
pub struct TrackerState {
    pub directory: Directory,
    pub store: SnapshotStore,
}

/// Accept loop. Never returns on a per-client failure; a bad or slow peer only
/// costs its own task.
pub async fn run(listener: TcpListener, state: Arc<Mutex<TrackerState>>) -> std::io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = state.clone();
                tokio::spawn(async move {
                    debug!(%addr, "peer connected");
                    if let Err(e) = serve_connection(stream, addr, state).await {
                        warn!(%addr, error = %e, "connection error");
                    }
                    debug!(%addr, "peer disconnected");
                });
            }
            Err(e) => {
                // Accept can fail transiently (fd exhaustion); back off and keep serving.
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Serve one peer: read command lines until the remote closes, reply to each.
/// The lock is scoped to the directory transaction, never across socket I/O.
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<Mutex<TrackerState>>,
) -> std::io::Result<()> {
    let peer = PeerId(addr.ip());
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            // Remote closed or sent nothing: graceful disconnect.
            return Ok(());
        }
        if line.len() > MAX_LINE_LEN {
            warn!(%addr, "request line too long");
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match parse_command(trimmed) {
            Ok(cmd) => match apply(&cmd, peer, &state).await {
                Some(reply) => reply,
                None => {
                    // Flush failed: the success reply must not go out (durable
                    // before ack). Drop the connection.
                    warn!(%addr, "snapshot flush failed; closing connection");
                    return Ok(());
                }
            },
            Err(CommandParseError::Unknown) => Reply::UnknownCommand,
            Err(CommandParseError::BadArgs) => Reply::InvalidCommand,
        };

        let mut text = format_reply(&reply);
        text.push('\n');
        write_half.write_all(text.as_bytes()).await?;
    }
}

/// Run one command as a transaction: process under the lock and, when the
/// directory changed, flush the snapshot before the reply is released. Returns
/// None when the flush fails; the in-memory directory is rolled back so memory
/// and disk stay in agreement.
async fn apply(cmd: &Command, peer: PeerId, state: &Arc<Mutex<TrackerState>>) -> Option<Reply> {
    let mut st = state.lock().await;
    let rollback = match cmd {
        Command::Join | Command::CreateFile { .. } | Command::DeleteFile { .. } | Command::Leave => {
            Some(st.directory.clone())
        }
        Command::Search { .. } | Command::ListFiles => None,
    };
    let out = process(cmd, peer, &mut st.directory);
    if out.mutated {
        if let Err(e) = st.store.save(&st.directory).await {
            warn!(error = %e, "directory snapshot write failed");
            if let Some(prev) = rollback {
                st.directory = prev;
            }
            return None;
        }
    }
    Some(out.reply)
}
