//! TCP connection handler
//!
//! Owns the socket for one session: a reader that drains whatever the
//! socket has ready without blocking and hands the framed line to the
//! ChatServer, and a writer that drains the session's outbound channel.

use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::framer::LineFramer;
use crate::server::ConnectionEvent;
use crate::types::SessionId;

/// Most bytes gathered into one line before handing it over
const MAX_TURN_BYTES: usize = 4096;

/// Drive a connection until either side closes it
///
/// The reader ending (EOF or read error) reports `Closed` to the server.
/// The writer ending cleanly means the server already dropped the
/// session, so the reader is abandoned without reporting anything.
pub async fn handle_connection(
    session_id: SessionId,
    stream: TcpStream,
    outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<ConnectionEvent>,
    read_chunk_size: usize,
) {
    let (read_half, write_half) = stream.into_split();

    let mut write_task = tokio::spawn(write_loop(session_id, write_half, outbound));
    let reader = read_loop(session_id, read_half, &events, read_chunk_size);
    tokio::pin!(reader);

    let reader_done = tokio::select! {
        () = &mut reader => true,
        result = &mut write_task => {
            match result {
                Ok(Ok(())) => {
                    debug!("Session {} released by server", session_id);
                    return;
                }
                Ok(Err(e)) => warn!("Write to session {} failed: {}", session_id, e),
                Err(e) => error!("Writer task for session {} failed: {}", session_id, e),
            }
            false
        }
    };
    if !reader_done {
        reader.await;
    }

    let _ = events.send(ConnectionEvent::Closed { session_id }).await;
    debug!("Connection handler ended for {}", session_id);
}

/// Read turns until the peer closes or reading fails
async fn read_loop(
    session_id: SessionId,
    reader: OwnedReadHalf,
    events: &mpsc::Sender<ConnectionEvent>,
    read_chunk_size: usize,
) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; read_chunk_size.max(1)];

    loop {
        if let Err(e) = reader.readable().await {
            warn!("Readiness error for {}: {}", session_id, e);
            return;
        }

        let closed = read_turn(session_id, &reader, &mut framer, &mut buf);

        if let Some(line) = framer.take_line() {
            trace!("Session {} turn produced {} bytes", session_id, line.len());
            if events
                .send(ConnectionEvent::Line { session_id, line })
                .await
                .is_err()
            {
                debug!("Server closed, ending read task for {}", session_id);
                return;
            }
        }
        if closed {
            return;
        }
    }
}

/// Pull everything available right now into the framer
///
/// Returns true if the peer closed the stream or the read failed.
fn read_turn(
    session_id: SessionId,
    reader: &OwnedReadHalf,
    framer: &mut LineFramer,
    buf: &mut [u8],
) -> bool {
    let mut total = 0;
    while total < MAX_TURN_BYTES {
        match reader.try_read(buf) {
            Ok(0) => {
                debug!("Session {} reached end of stream", session_id);
                return true;
            }
            Ok(n) => {
                framer.push(&buf[..n]);
                total += n;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Read error for {}: {}", session_id, e);
                return true;
            }
        }
    }
    false
}

/// Write outbound messages until the server drops the session
async fn write_loop(
    session_id: SessionId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<String>,
) -> io::Result<()> {
    while let Some(text) = outbound.recv().await {
        writer.write_all(text.as_bytes()).await?;
    }
    debug!("Write task ended for {}", session_id);
    let _ = writer.shutdown().await;
    Ok(())
}
