//! TCP connection handler
//!
//! Handles individual client connections: line framing, bounded reads,
//! and bidirectional communication with the MatchServer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::acceptor::ShutdownHandle;
use crate::config::ServerConfig;
use crate::error::{AppError, ProtocolError};
use crate::message::ServerMessage;
use crate::server::ServerCommand;
use crate::types::SessionId;

/// Handle a new TCP connection
///
/// Registers a session with the MatchServer, pumps lines in and messages
/// out, and reports the disconnect when either direction ends.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
    shutdown: ShutdownHandle,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let session_id = SessionId::new();
    debug!("TCP connection from {} is session {}", peer_addr, session_id);

    let (read_half, write_half) = stream.into_split();

    // Create channel for server -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

    // Register with MatchServer
    if cmd_tx
        .send(ServerCommand::Connect {
            session_id,
            peer_addr: peer_addr.clone(),
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register session {} - server closed", session_id);
        return Err(AppError::ChannelSend);
    }

    let flush_timeout = config.read_timeout();
    let write_timeout = config.write_timeout();
    let mut read_task = tokio::spawn(read_lines(
        read_half,
        session_id,
        cmd_tx.clone(),
        config,
        shutdown,
    ));
    let mut write_task = tokio::spawn(write_messages(
        write_half,
        session_id,
        msg_rx,
        write_timeout,
    ));

    // Wait for either direction to finish, then stop the other
    tokio::select! {
        ended = &mut read_task => {
            debug!("Read task completed for {}", session_id);
            if matches!(ended, Ok(ReadEnd::Shutdown)) {
                // The server closes every session after its goodbye notice
                let _ = (&mut write_task).await;
            } else {
                // The server drops its sender on disconnect, which lets the
                // writer flush queued replies and close
                let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;
                if timeout(flush_timeout, &mut write_task).await.is_err() {
                    write_task.abort();
                }
            }
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", session_id);
            read_task.abort();
            let _ = cmd_tx.send(ServerCommand::Disconnect { session_id }).await;
        }
    }

    info!("Session {} ({}) closed", session_id, peer_addr);

    Ok(())
}

/// Why the reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// EOF, read error, idle limit, or the server went away
    Closed,
    /// Shutdown flag observed; the connection is left for the server to close
    Shutdown,
}

/// Read newline-delimited input and forward it to the MatchServer
///
/// Every read is bounded by the configured timeout so the shutdown flag is
/// re-checked regularly. Partial lines survive a timeout in `buf`.
async fn read_lines(
    read_half: OwnedReadHalf,
    session_id: SessionId,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<ServerConfig>,
    shutdown: ShutdownHandle,
) -> ReadEnd {
    let max = config.max_line_bytes;
    let mut reader = BufReader::new(read_half);
    let mut buf: Vec<u8> = Vec::new();
    let mut idle_polls = 0u32;
    // Inside an over-long line; skip up to the next newline
    let mut discarding = false;

    loop {
        if shutdown.is_triggered() {
            debug!("Shutdown observed by reader for {}", session_id);
            return ReadEnd::Shutdown;
        }

        // One byte of headroom for the newline itself
        let remaining = (max + 1).saturating_sub(buf.len()) as u64;
        let read = timeout(
            config.read_timeout(),
            (&mut reader).take(remaining).read_until(b'\n', &mut buf),
        )
        .await;

        let cmd = match read {
            Err(_elapsed) => {
                idle_polls += 1;
                if config.max_idle_polls.is_some_and(|limit| idle_polls >= limit) {
                    info!("Session {} idle for {} polls, disconnecting", session_id, idle_polls);
                    break;
                }
                continue;
            }
            Ok(Err(e)) => {
                debug!("Read error for {}: {}", session_id, e);
                break;
            }
            Ok(Ok(0)) => {
                // EOF; a trailing unterminated line still counts
                if !buf.is_empty() && !discarding {
                    let line = std::mem::take(&mut buf);
                    let _ = cmd_tx.send(line_command(session_id, line)).await;
                }
                debug!("Session {} reached EOF", session_id);
                break;
            }
            Ok(Ok(_)) if buf.ends_with(b"\n") => {
                idle_polls = 0;
                let line = std::mem::take(&mut buf);
                if discarding {
                    discarding = false;
                    continue;
                }
                line_command(session_id, line)
            }
            Ok(Ok(_)) if buf.len() > max => {
                buf.clear();
                if discarding {
                    continue;
                }
                discarding = true;
                info!("Session {} sent a line over {} bytes, discarding it", session_id, max);
                ServerCommand::Rejected {
                    session_id,
                    error: ProtocolError::LineTooLong { max },
                }
            }
            Ok(Ok(_)) => continue,
        };

        if cmd_tx.send(cmd).await.is_err() {
            debug!("Server closed, ending read task for {}", session_id);
            break;
        }
    }
    debug!("Read task ended for {}", session_id);
    ReadEnd::Closed
}

/// Turn raw line bytes into a `Line` or a UTF-8 rejection
fn line_command(session_id: SessionId, mut bytes: Vec<u8>) -> ServerCommand {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => ServerCommand::Line { session_id, line },
        Err(_) => ServerCommand::Rejected {
            session_id,
            error: ProtocolError::InvalidUtf8,
        },
    }
}

/// Write queued server messages until the MatchServer drops the sender
///
/// A peer that does not drain its socket within `write_timeout` is dropped.
async fn write_messages(
    mut write_half: OwnedWriteHalf,
    session_id: SessionId,
    mut msg_rx: mpsc::Receiver<ServerMessage>,
    write_timeout: Duration,
) {
    while let Some(msg) = msg_rx.recv().await {
        match timeout(write_timeout, write_half.write_all(msg.to_wire().as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Write failed for {}: {}, ending write task", session_id, e);
                break;
            }
            Err(_elapsed) => {
                info!("Session {} is not reading, closing connection", session_id);
                return;
            }
        }
    }
    debug!("Write task ended for {}", session_id);

    let _ = write_half.shutdown().await;
}
