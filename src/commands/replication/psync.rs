//! PSYNC command implementation for Redis replication synchronization.
//!
//! Only full resynchronization is supported: whatever id and offset the
//! replica asks for, it receives `FULLRESYNC` followed by a snapshot and is
//! then streamed every write from that point on.

use bytes::{Bytes, BytesMut};
use tracing::{info, warn};

use crate::{
    commands::{
        command_error::CommandError,
        command_handler::{argument_str, CommandResult},
    },
    connection::Session,
    rdb::EMPTY_RDB,
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for the PSYNC command.
///
/// PSYNC is used by replicas to request synchronization with the master,
/// providing the master's replication ID and the replica's current offset.
#[derive(Debug, PartialEq)]
pub struct PsyncArguments {
    /// The replication ID the replica last saw (or "?" when it has none)
    repl_id: String,
    /// The replica's current offset (or -1 when it has none)
    offset: i64,
}

impl PsyncArguments {
    /// Parses and validates arguments for the PSYNC command.
    ///
    /// # Returns
    ///
    /// * `Ok(PsyncArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidPsyncCommand)` - If not exactly 2 arguments
    /// * `Err(CommandError::InvalidPsyncOffset)` - If offset is not a valid integer
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [repl_id, offset] = arguments else {
            return Err(CommandError::InvalidPsyncCommand);
        };

        let repl_id = argument_str(repl_id, CommandError::InvalidPsyncCommand)?.to_string();
        let offset = argument_str(offset, CommandError::InvalidPsyncOffset)?
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(Self { repl_id, offset })
    }
}

/// Handles the Redis PSYNC command.
///
/// Writes `+FULLRESYNC <repl_id> <offset>\r\n` and the snapshot straight to
/// the session's outbound queue, then marks the connection as a synced
/// replica. Both happen under the replica-set lock, so no propagated write can
/// be queued ahead of the snapshot or be missed after it. The reply is queued
/// without waiting: a connection with no room left for it is deregistered and
/// closed rather than stalling every writer behind the lock.
///
/// # Returns
///
/// * `Ok(CommandResult::NoResponse)` - The reply has already been queued
/// * `Err(CommandError::PsyncOnReplica)` - This node is not a master
/// * `Err(CommandError::ConnectionClosed)` - The connection is gone or its queue is full
pub async fn psync(
    state: &ServerState,
    session: &Session,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    if !state.is_master() {
        return Err(CommandError::PsyncOnReplica);
    }

    let mut replicas = state.replicas.lock().await;
    let offset = state.repl_offset();

    let mut reply = BytesMut::new();
    RespValue::SimpleString(format!("FULLRESYNC {} {}", state.repl_id, offset))
        .encode_into(&mut reply);
    RespValue::encode_snapshot(EMPTY_RDB, &mut reply);

    if session.try_send(reply.freeze()).is_err() {
        replicas.remove(session.id);
        drop(replicas);

        warn!(peer = %session.peer_address, "no room to queue full resynchronization");
        session.close();
        return Err(CommandError::ConnectionClosed);
    }

    let registered = replicas.mark_synced(session.id);

    info!(
        peer = %session.peer_address,
        requested_id = %psync_arguments.repl_id,
        requested_offset = psync_arguments.offset,
        offset,
        registered,
        "full resynchronization"
    );

    Ok(CommandResult::NoResponse)
}
