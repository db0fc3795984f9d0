//! A Redis-compatible in-memory key-value server with master-replica
//! replication.
//!
//! The crate provides:
//!
//! - A RESP codec and buffered frame reader for pipelined clients
//! - Key-value operations with millisecond expiry (SET, GET, DEL, EXISTS)
//! - Server commands (PING, ECHO, INFO, SHUTDOWN)
//! - Replication: masters stream every write to attached replicas, replicas
//!   handshake with their master and reconnect after failures
//!
//! Connections are served concurrently on Tokio; every task shares one
//! [`state::ServerState`].

pub mod commands;
pub mod connection;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod state;
