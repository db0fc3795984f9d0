//! REPLCONF command implementation for Redis replication configuration.
//!
//! The REPLCONF command is used during the Redis replication handshake process
//! to exchange configuration information between master and replica servers.
//! On a master, `REPLCONF listening-port` is also the moment a connection is
//! registered as a replica.

use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{debug, info};

use crate::{
    commands::{
        command_error::CommandError,
        command_handler::{argument_str, CommandResult},
    },
    connection::{Link, Session},
    resp::RespValue,
    state::ServerState,
};

#[derive(Debug, PartialEq)]
enum ReplconfConfiguration {
    ListeningPort(u16),
    Capabilities(Vec<String>),
    GetAck,
    Ack(u64),
    Other(String),
}

/// Represents the parsed arguments for the REPLCONF command.
#[derive(Debug, PartialEq)]
pub struct ReplconfArguments {
    configuration: ReplconfConfiguration,
}

impl ReplconfArguments {
    /// Parses and validates arguments for the REPLCONF command.
    ///
    /// * `listening-port <port>` - the port the replica serves clients on
    /// * `capa <capability> [capa <capability> ...]` - capabilities, accepted and ignored
    /// * `getack <*>` - asks the replica to report its processed offset
    /// * `ack <offset>` - a replica reporting its processed offset
    ///
    /// Unknown options are accepted so newer replicas can still attach.
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::InvalidReplconfCommand);
        }

        let option = argument_str(&arguments[0], CommandError::InvalidReplconfCommand)?
            .to_lowercase();

        let configuration = match option.as_str() {
            "listening-port" => {
                let [_, port] = arguments else {
                    return Err(CommandError::InvalidReplconfCommand);
                };

                let port = argument_str(port, CommandError::InvalidReplconfCommand)?
                    .parse::<u16>()
                    .map_err(|_| CommandError::InvalidReplconfCommand)?;

                ReplconfConfiguration::ListeningPort(port)
            }
            "capa" => {
                if arguments.len() % 2 != 0 {
                    return Err(CommandError::InvalidReplconfCommand);
                }

                let capabilities = arguments
                    .chunks(2)
                    .map(|pair| {
                        if !pair[0].eq_ignore_ascii_case(b"capa") {
                            return Err(CommandError::InvalidReplconfCommand);
                        }
                        Ok(String::from_utf8_lossy(&pair[1]).to_string())
                    })
                    .collect::<Result<Vec<String>, CommandError>>()?;

                ReplconfConfiguration::Capabilities(capabilities)
            }
            "getack" => {
                if arguments.len() != 2 {
                    return Err(CommandError::InvalidReplconfCommand);
                }

                ReplconfConfiguration::GetAck
            }
            "ack" => {
                let [_, offset] = arguments else {
                    return Err(CommandError::InvalidReplconfCommand);
                };

                let offset = argument_str(offset, CommandError::InvalidReplconfCommand)?
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidReplconfCommand)?;

                ReplconfConfiguration::Ack(offset)
            }
            _ => ReplconfConfiguration::Other(option),
        };

        Ok(Self { configuration })
    }
}

/// Handles the Redis REPLCONF command.
///
/// # Returns
///
/// * `+OK` for `listening-port`, `capa` and unknown options
/// * `*3 REPLCONF ACK <offset>` for `getack`, where the offset counts the bytes
///   applied from this node's master (0 on any other connection)
/// * no reply for `ack`
pub async fn replconf(
    state: &ServerState,
    session: &Session,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    match replconf_arguments.configuration {
        ReplconfConfiguration::ListeningPort(port) => {
            if state.is_master() {
                let address = SocketAddr::new(session.peer_address.ip(), port);
                state
                    .replicas
                    .lock()
                    .await
                    .register(session.id, address, session.outbound(), session.close_handle());

                info!(replica = %address, "registered replica");
            } else {
                debug!(peer = %session.peer_address, "ignoring replica registration on a replica");
            }

            Ok(ok())
        }
        ReplconfConfiguration::Capabilities(capabilities) => {
            debug!(peer = %session.peer_address, ?capabilities, "replica capabilities");
            Ok(ok())
        }
        ReplconfConfiguration::GetAck => {
            let offset = match session.link {
                Link::Master => state.repl_offset(),
                Link::Client => 0,
            };

            Ok(CommandResult::Response(
                RespValue::command(["REPLCONF", "ACK", offset.to_string().as_str()]).encode(),
            ))
        }
        ReplconfConfiguration::Ack(offset) => {
            debug!(peer = %session.peer_address, offset, "replica acknowledged offset");
            Ok(CommandResult::NoResponse)
        }
        ReplconfConfiguration::Other(option) => {
            debug!(peer = %session.peer_address, %option, "ignoring unknown REPLCONF option");
            Ok(ok())
        }
    }
}

fn ok() -> CommandResult {
    CommandResult::Response(RespValue::simple_string("OK").encode())
}
