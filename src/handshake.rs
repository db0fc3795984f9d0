//! Replica side of the replication handshake.
//!
//! The handshake follows the Redis replication protocol:
//! - Master must respond with PONG to PING
//! - Master must respond with OK to both REPLCONF commands
//! - Master must respond with FULLRESYNC to PSYNC
//! - Master must send a snapshot after FULLRESYNC

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{
    input::{CommandReadError, FrameReader},
    resp::RespValue,
};

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("Failed to connect to master at {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error reading from master: {0}")]
    Read(#[from] CommandReadError),
    #[error("Unexpected reply from master to {step}: {reply:?}")]
    UnexpectedReply { step: &'static str, reply: RespValue },
    #[error("Invalid FULLRESYNC reply: {0}")]
    InvalidFullResync(String),
}

/// What the master announced in its `FULLRESYNC` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullResync {
    pub repl_id: String,
    pub offset: u64,
}

/// Performs the handshake over an already connected stream and consumes the
/// snapshot. Frames the master sends right after the snapshot stay buffered in
/// `reader`, ready for the streaming phase.
pub async fn handshake<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    listening_port: u16,
) -> Result<FullResync, ReplicationError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let reply = send_and_read_reply(reader, writer, RespValue::command(["PING"])).await?;
    expect_simple_string("PING", reply, "PONG")?;

    let port = listening_port.to_string();
    let reply = send_and_read_reply(
        reader,
        writer,
        RespValue::command(["REPLCONF", "listening-port", port.as_str()]),
    )
    .await?;
    expect_simple_string("REPLCONF listening-port", reply, "OK")?;

    let reply = send_and_read_reply(
        reader,
        writer,
        RespValue::command(["REPLCONF", "capa", "eof", "capa", "psync2"]),
    )
    .await?;
    expect_simple_string("REPLCONF capa", reply, "OK")?;

    let reply = send_and_read_reply(reader, writer, RespValue::command(["PSYNC", "?", "-1"])).await?;
    let resync = parse_full_resync(reply)?;

    let snapshot = reader.read_snapshot().await?;
    debug!(bytes = snapshot.len(), "received snapshot from master");

    Ok(resync)
}

async fn send_and_read_reply<R, W>(
    reader: &mut FrameReader<R>,
    writer: &mut W,
    command: RespValue,
) -> Result<RespValue, ReplicationError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(&command.encode()).await?;
    writer.flush().await?;

    let frame = reader.read_frame().await?;

    Ok(frame.value)
}

fn expect_simple_string(
    step: &'static str,
    reply: RespValue,
    expected: &str,
) -> Result<(), ReplicationError> {
    if matches!(&reply, RespValue::SimpleString(s) if s.eq_ignore_ascii_case(expected)) {
        return Ok(());
    }

    Err(ReplicationError::UnexpectedReply { step, reply })
}

fn parse_full_resync(reply: RespValue) -> Result<FullResync, ReplicationError> {
    let RespValue::SimpleString(line) = reply else {
        return Err(ReplicationError::UnexpectedReply {
            step: "PSYNC",
            reply,
        });
    };

    match parse_full_resync_line(&line) {
        Some(resync) => Ok(resync),
        None => Err(ReplicationError::InvalidFullResync(line)),
    }
}

/// `FULLRESYNC <repl_id> <offset>`
fn parse_full_resync_line(line: &str) -> Option<FullResync> {
    let mut parts = line.split_whitespace();

    let keyword = parts.next()?;
    let repl_id = parts.next()?;
    let offset = parts.next()?.parse::<u64>().ok()?;

    if parts.next().is_some()
        || !keyword.eq_ignore_ascii_case("FULLRESYNC")
        || !is_valid_repl_id(repl_id)
    {
        return None;
    }

    Some(FullResync {
        repl_id: repl_id.to_string(),
        offset,
    })
}

/// A replication id is exactly 40 ASCII alphanumeric characters.
fn is_valid_repl_id(repl_id: &str) -> bool {
    repl_id.len() == 40 && repl_id.bytes().all(|b| b.is_ascii_alphanumeric())
}
