//! Per-instance shared state: keyspace, replication bookkeeping and the
//! shutdown signal. Every connection task holds an `Arc<ServerState>`.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::{
    key_value_store::KeyValueStore,
    replication::ReplicaSet,
    resp::RespValue,
    server::{Role, ServerConfig},
};

/// Replication id advertised by masters in `FULLRESYNC` and `INFO`.
pub const DEFAULT_REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

/// Replica-side state of the link to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Handshaking,
    Streaming,
}

/// One-shot stop signal, cloned into every loop that has to observe it. The
/// server holds one for the whole process and each session holds its own.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once shutdown has been triggered (immediately if it already was).
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this can only return Ok.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ServerState {
    pub config: ServerConfig,
    pub store: Mutex<KeyValueStore>,
    pub replicas: Mutex<ReplicaSet>,
    pub repl_id: String,
    repl_offset: AtomicU64,
    link_state: watch::Sender<LinkState>,
    shutdown: Shutdown,
    next_connection_id: AtomicU64,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        let (link_state, _) = watch::channel(LinkState::Disconnected);

        Self {
            config,
            store: Mutex::new(KeyValueStore::new()),
            replicas: Mutex::new(ReplicaSet::new()),
            repl_id: DEFAULT_REPLICATION_ID.to_string(),
            repl_offset: AtomicU64::new(0),
            link_state,
            shutdown: Shutdown::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn role(&self) -> &Role {
        &self.config.role
    }

    pub fn is_master(&self) -> bool {
        matches!(self.config.role, Role::Master)
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// On a master: bytes of write traffic propagated so far. On a replica:
    /// the master's offset at full resync plus every byte applied since.
    pub fn repl_offset(&self) -> u64 {
        self.repl_offset.load(Ordering::SeqCst)
    }

    pub fn advance_repl_offset(&self, bytes: usize) {
        self.repl_offset.fetch_add(bytes as u64, Ordering::SeqCst);
    }

    pub fn reset_repl_offset(&self, offset: u64) {
        self.repl_offset.store(offset, Ordering::SeqCst);
    }

    pub fn link_state(&self) -> LinkState {
        *self.link_state.borrow()
    }

    pub fn set_link_state(&self, state: LinkState) {
        self.link_state.send_replace(state);
    }

    pub fn subscribe_link_state(&self) -> watch::Receiver<LinkState> {
        self.link_state.subscribe()
    }

    /// Forwards a write command to every synced replica. No-op on replicas.
    ///
    /// The offset is advanced under the replica-set lock so that a concurrent
    /// `PSYNC` reports an offset consistent with the stream its replica receives.
    pub async fn propagate(&self, command: &RespValue) {
        if !self.is_master() {
            return;
        }

        let frame = command.encode();
        let mut replicas = self.replicas.lock().await;
        self.advance_repl_offset(frame.len());

        let delivered = replicas.propagate(&frame);
        debug!(
            bytes = frame.len(),
            delivered,
            offset = self.repl_offset(),
            "propagated write command"
        );
    }
}
