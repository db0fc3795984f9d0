use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::Role,
    state::{LinkState, ServerState},
};

enum InfoSection {
    Default,
    Replication,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let section = match arguments {
            [] => InfoSection::Default,
            [section] if section.eq_ignore_ascii_case(b"replication") => InfoSection::Replication,
            [_] => return Err(CommandError::InvalidInfoSection),
            _ => return Err(CommandError::InvalidInfoCommand),
        };

        Ok(InfoArguments { section })
    }
}

/// Handles the Redis INFO command.
///
/// Only replication data exists, so every section renders the same single
/// line; a replica additionally reports where its master is and whether the
/// link is up.
pub async fn info(state: &ServerState, arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let connected_slaves = state.replicas.lock().await.len();

    let mut replication = vec![
        format!("role:{}", state.role().as_str()),
        format!("connected_slaves:{}", connected_slaves),
        format!("master_replid:{}", state.repl_id),
        format!("master_repl_offset:{}", state.repl_offset()),
    ];

    if let Role::Replica { host, port } = state.role() {
        let link_status = match state.link_state() {
            LinkState::Streaming => "up",
            LinkState::Disconnected | LinkState::Handshaking => "down",
        };

        replication.push(format!("master_host:{}", host));
        replication.push(format!("master_port:{}", port));
        replication.push(format!("master_link_status:{}", link_status));
    }

    match info_arguments.section {
        InfoSection::Default | InfoSection::Replication => Ok(CommandResult::Response(
            RespValue::SimpleString(replication.join(", ")).encode(),
        )),
    }
}
