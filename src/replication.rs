//! Both sides of master-replica replication: the master's set of attached
//! replicas, and the replica's loop that keeps a link to its master alive.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use tokio::{net::TcpStream, sync::mpsc};
use tracing::{debug, info, warn};

use crate::{
    connection::handle_master_connection,
    handshake::{handshake, ReplicationError},
    input::FrameReader,
    state::{LinkState, ServerState, Shutdown},
};

/// A connection that announced itself with `REPLCONF listening-port`.
#[derive(Debug)]
pub struct Replica {
    /// Peer ip combined with the announced listening port.
    pub address: SocketAddr,
    sender: mpsc::Sender<Bytes>,
    /// Closes the replica's connection once it is dropped from the set.
    close: Shutdown,
    /// Set once `FULLRESYNC` and the snapshot have been queued.
    synced: bool,
}

/// Replicas attached to a master, keyed by connection id.
#[derive(Debug, Default)]
pub struct ReplicaSet {
    replicas: HashMap<u64, Replica>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection as a replica. It receives no writes until
    /// [`ReplicaSet::mark_synced`] is called for it.
    pub fn register(
        &mut self,
        connection_id: u64,
        address: SocketAddr,
        sender: mpsc::Sender<Bytes>,
        close: Shutdown,
    ) {
        self.replicas.insert(
            connection_id,
            Replica {
                address,
                sender,
                close,
                synced: false,
            },
        );
    }

    /// Returns false when the connection never registered.
    pub fn mark_synced(&mut self, connection_id: u64) -> bool {
        match self.replicas.get_mut(&connection_id) {
            Some(replica) => {
                replica.synced = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, connection_id: u64) -> Option<Replica> {
        self.replicas.remove(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn clear(&mut self) {
        self.replicas.clear();
    }

    /// Queues `frame` on every synced replica and returns how many accepted it.
    ///
    /// A replica whose queue is full or whose connection is gone is dropped
    /// from the set and its connection is closed, so it notices the loss and
    /// reconnects for a fresh full resync.
    pub fn propagate(&mut self, frame: &Bytes) -> usize {
        let mut delivered = 0;

        self.replicas.retain(|connection_id, replica| {
            if !replica.synced {
                return true;
            }

            match replica.sender.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        connection_id,
                        replica = %replica.address,
                        error = %e,
                        "dropping replica"
                    );
                    replica.close.trigger();
                    false
                }
            }
        });

        delivered
    }
}

/// Keeps this replica attached to its master until shutdown: connect,
/// handshake, stream, and after any failure wait `reconnect_delay` and retry.
pub async fn run_replication(
    state: Arc<ServerState>,
    master_host: String,
    master_port: u16,
    listening_port: u16,
) {
    let shutdown = state.shutdown().clone();

    while !shutdown.is_triggered() {
        state.set_link_state(LinkState::Handshaking);

        let result = tokio::select! {
            result = connect_and_stream(&state, &master_host, master_port, listening_port) => result,
            _ = shutdown.wait() => Ok(()),
        };

        state.set_link_state(LinkState::Disconnected);

        match result {
            Ok(()) => info!(master_host = %master_host, master_port, "master link closed"),
            Err(e) => warn!(master_host = %master_host, master_port, error = %e, "master link failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(state.config.reconnect_delay) => (),
            _ = shutdown.wait() => break,
        }
    }

    debug!("replication loop stopped");
}

async fn connect_and_stream(
    state: &Arc<ServerState>,
    master_host: &str,
    master_port: u16,
    listening_port: u16,
) -> Result<(), ReplicationError> {
    let address = format!("{}:{}", master_host, master_port);
    let stream = TcpStream::connect(&address)
        .await
        .map_err(|source| ReplicationError::Connect {
            address: address.clone(),
            source,
        })?;
    let master_address = stream.peer_addr()?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = FrameReader::new(reader);

    let resync = handshake(&mut reader, &mut writer, listening_port).await?;

    state.reset_repl_offset(resync.offset);
    state.set_link_state(LinkState::Streaming);
    info!(
        master = %master_address,
        repl_id = %resync.repl_id,
        offset = resync.offset,
        "replication link established"
    );

    handle_master_connection(reader, writer, master_address, Arc::clone(state)).await?;

    Ok(())
}
