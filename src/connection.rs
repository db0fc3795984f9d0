use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{CommandHandler, CommandResult},
    input::{CommandReadError, FrameReader},
    resp::RespValue,
    state::{ServerState, Shutdown},
};

/// Responses and propagated writes queued per connection before the writer
/// task falls behind and propagation to it starts failing.
pub const OUTBOUND_CAPACITY: usize = 1024;

/// How long a closing connection may spend flushing queued bytes to a peer
/// that is not reading before its socket is closed anyway.
pub const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What the peer on the other end of a connection is to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Ordinary client, or a replica attached to this master.
    Client,
    /// This node's own upstream master; its command stream is applied silently.
    Master,
}

/// Per-connection context handed to the command engine.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub peer_address: SocketAddr,
    pub link: Link,
    outbound: mpsc::Sender<Bytes>,
    closed: Shutdown,
}

impl Session {
    pub fn new(id: u64, peer_address: SocketAddr, link: Link, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            peer_address,
            link,
            outbound,
            closed: Shutdown::new(),
        }
    }

    /// Queues bytes for the connection's writer task.
    pub async fn send(&self, data: Bytes) -> Result<(), CommandReadError> {
        self.outbound
            .send(data)
            .await
            .map_err(|_| CommandReadError::ConnectionClosed)
    }

    /// Queues bytes only if there is room right now.
    pub fn try_send(&self, data: Bytes) -> Result<(), CommandReadError> {
        self.outbound
            .try_send(data)
            .map_err(|_| CommandReadError::ConnectionClosed)
    }

    /// Handle used to register this connection as a replica.
    pub fn outbound(&self) -> mpsc::Sender<Bytes> {
        self.outbound.clone()
    }

    /// Signal that makes the connection's task stop reading and close the socket.
    pub fn close_handle(&self) -> Shutdown {
        self.closed.clone()
    }

    pub fn close(&self) {
        self.closed.trigger();
    }
}

pub async fn handle_client_connection(
    stream: TcpStream,
    peer_address: SocketAddr,
    state: Arc<ServerState>,
) {
    let (reader, writer) = stream.into_split();
    let (outbound, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer_handle = spawn_writer(writer, receiver, peer_address);

    let session = Session::new(state.next_connection_id(), peer_address, Link::Client, outbound);
    let connection_id = session.id;
    let closed = session.close_handle();

    match run_session(FrameReader::new(reader), session, &state).await {
        Ok(()) => debug!(peer = %peer_address, "connection closed"),
        Err(e) => warn!(peer = %peer_address, error = %e, "connection closed with error"),
    }

    // The replica set holds a sender too; the writer only finishes once it is gone.
    if let Some(replica) = state.replicas.lock().await.remove(connection_id) {
        info!(replica = %replica.address, "replica disconnected");
    }

    // A connection closed by the server gets nothing more written to it.
    stop_writer(writer_handle, peer_address, !closed.is_triggered()).await;
}

/// Applies the command stream arriving from this node's master. Replies are
/// suppressed except where the replication protocol requires them.
pub async fn handle_master_connection<R, W>(
    reader: FrameReader<R>,
    writer: W,
    master_address: SocketAddr,
    state: Arc<ServerState>,
) -> Result<(), CommandReadError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer_handle = spawn_writer(writer, receiver, master_address);

    let session = Session::new(state.next_connection_id(), master_address, Link::Master, outbound);
    let result = run_session(reader, session, &state).await;

    stop_writer(writer_handle, master_address, true).await;

    result
}

/// Read, decode, dispatch, respond; until the peer closes, a frame fails to
/// decode, the session is closed, or shutdown is triggered. The reader is
/// dropped on return.
async fn run_session<R>(
    mut reader: FrameReader<R>,
    session: Session,
    state: &ServerState,
) -> Result<(), CommandReadError>
where
    R: AsyncRead + Unpin,
{
    let shutdown = state.shutdown().clone();

    loop {
        let frame = tokio::select! {
            frame = reader.read_frame() => match frame {
                Ok(frame) => frame,
                Err(CommandReadError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            },
            _ = session.closed.wait() => {
                info!(peer = %session.peer_address, "connection closed by server");
                return Ok(());
            }
            _ = shutdown.wait() => return Ok(()),
        };

        let command_handler = match CommandHandler::new(frame.value) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(peer = %session.peer_address, error = %e, "malformed command");
                if session.link == Link::Master {
                    state.advance_repl_offset(frame.length);
                } else if !respond(&session, RespValue::NullBulkString.encode(), &shutdown).await? {
                    return Ok(());
                }
                continue;
            }
        };

        debug!(
            peer = %session.peer_address,
            command = %command_handler.name,
            "handling command"
        );

        let command_result = command_handler.handle(state, &session).await;

        // Offset reported by GETACK covers everything before the GETACK itself.
        if session.link == Link::Master {
            state.advance_repl_offset(frame.length);
        }

        let delivered = match command_result {
            Ok(CommandResult::NoResponse) => true,
            Ok(CommandResult::Response(response)) => respond(&session, response, &shutdown).await?,
            Ok(CommandResult::Shutdown(response)) => {
                respond(&session, response, &shutdown).await?;
                info!(peer = %session.peer_address, "shutdown requested");
                state.shutdown().trigger();
                return Ok(());
            }
            Err(e) => {
                warn!(
                    peer = %session.peer_address,
                    command = %command_handler.name,
                    error = %e,
                    "command failed"
                );
                match session.link {
                    Link::Client => {
                        respond(&session, RespValue::NullBulkString.encode(), &shutdown).await?
                    }
                    Link::Master => true,
                }
            }
        };

        if !delivered {
            return Ok(());
        }
    }
}

/// Queues a reply, waiting for room in the outbound queue unless the session
/// is closed or shutdown is triggered first. Returns false in that case.
async fn respond(
    session: &Session,
    data: Bytes,
    shutdown: &Shutdown,
) -> Result<bool, CommandReadError> {
    tokio::select! {
        result = session.send(data) => result.map(|()| true),
        _ = session.closed.wait() => Ok(false),
        _ = shutdown.wait() => Ok(false),
    }
}

/// Lets the writer flush what is still queued, for at most
/// [`WRITER_DRAIN_TIMEOUT`], then aborts it. Aborting drops the write half,
/// which closes the socket.
async fn stop_writer(mut writer_handle: JoinHandle<()>, peer_address: SocketAddr, drain: bool) {
    if drain {
        match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_handle).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                warn!(peer = %peer_address, error = %e, "writer task failed");
                return;
            }
            Err(_) => warn!(peer = %peer_address, "peer is not reading, dropping queued output"),
        }
    }

    writer_handle.abort();
}

fn spawn_writer<W>(
    mut writer: W,
    mut receiver: mpsc::Receiver<Bytes>,
    peer_address: SocketAddr,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(data) = receiver.recv().await {
            if let Err(e) = write_to_stream(&mut writer, &data).await {
                warn!(peer = %peer_address, error = %e, "error writing to stream");
                break;
            }
        }

        let _ = writer.shutdown().await;
    })
}

async fn write_to_stream<W>(writer: &mut W, response: &[u8]) -> tokio::io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(response).await?;
    writer.flush().await?;

    Ok(())
}
