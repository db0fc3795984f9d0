use bytes::Bytes;
use tracing::debug;

use crate::{
    commands::{
        command_error::CommandError,
        del::del,
        echo::echo,
        exists::exists,
        get::get,
        info::info,
        ping::ping,
        replication::{psync, replconf},
        set::set,
        shutdown::shutdown,
    },
    connection::{Link, Session},
    resp::RespValue,
    state::ServerState,
};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    NoResponse,
    Response(Bytes),
    /// Reply to send before the node starts shutting down.
    Shutdown(Bytes),
}

#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    /// Upper-cased verb.
    pub name: String,
    pub arguments: Vec<Bytes>,
    /// The frame as received; propagated verbatim to replicas.
    pub input: RespValue,
}

impl CommandHandler {
    pub fn new(input: RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = &input else {
            return Err(CommandError::InvalidCommand);
        };

        let Some((first, rest)) = elements.split_first() else {
            return Err(CommandError::InvalidCommand);
        };

        let name = String::from_utf8_lossy(&argument_bytes(first)?).to_uppercase();

        let arguments = rest
            .iter()
            .map(argument_bytes)
            .collect::<Result<Vec<Bytes>, CommandError>>()?;

        Ok(Self {
            name,
            arguments,
            input,
        })
    }

    /// Runs the command for a session. On the link to this node's own master
    /// only `REPLCONF` replies are sent back.
    pub async fn handle(
        &self,
        state: &ServerState,
        session: &Session,
    ) -> Result<CommandResult, CommandError> {
        let command_result = self.handle_command(state, session).await?;

        if session.link == Link::Master && self.name != "REPLCONF" {
            return Ok(CommandResult::NoResponse);
        }

        Ok(command_result)
    }

    async fn handle_command(
        &self,
        state: &ServerState,
        session: &Session,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping(&self.arguments),
            "ECHO" => echo(&self.arguments),
            "SET" => set(state, &self.arguments, &self.input).await,
            "GET" => get(state, &self.arguments).await,
            "DEL" => del(state, &self.arguments, &self.input).await,
            "EXISTS" => exists(state, &self.arguments).await,
            "INFO" => info(state, &self.arguments).await,
            "REPLCONF" => replconf(state, session, &self.arguments).await,
            "PSYNC" => psync(state, session, &self.arguments).await,
            "SHUTDOWN" => shutdown(&self.arguments),
            _ => {
                debug!(command = %self.name, "ignoring unknown command");
                Ok(CommandResult::NoResponse)
            }
        }
    }
}

fn argument_bytes(element: &RespValue) -> Result<Bytes, CommandError> {
    match element {
        RespValue::BulkString(data) => Ok(data.clone()),
        RespValue::SimpleString(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
        RespValue::Integer(i) => Ok(Bytes::from(i.to_string())),
        _ => Err(CommandError::InvalidCommandArgument),
    }
}

/// Interprets an argument as UTF-8 text, mapping failure to `error`.
pub fn argument_str(argument: &Bytes, error: CommandError) -> Result<&str, CommandError> {
    std::str::from_utf8(argument).map_err(|_| error)
}
