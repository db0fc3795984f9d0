use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

pub struct PingArguments;

impl PingArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidPingCommand);
        }

        Ok(Self)
    }
}

pub fn ping(arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    PingArguments::parse(arguments)?;

    Ok(CommandResult::Response(
        RespValue::simple_string("PONG").encode(),
    ))
}
