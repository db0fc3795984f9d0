use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

pub struct ShutdownArguments;

impl ShutdownArguments {
    /// Accepts no arguments, or one of the persistence modifiers `NOSAVE` /
    /// `SAVE`, which are meaningless without persistence and ignored.
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        match arguments {
            [] => Ok(Self),
            [modifier]
                if modifier.eq_ignore_ascii_case(b"nosave")
                    || modifier.eq_ignore_ascii_case(b"save") =>
            {
                Ok(Self)
            }
            _ => Err(CommandError::InvalidShutdownCommand),
        }
    }
}

/// Handles the Redis SHUTDOWN command. The connection loop sends the `OK`
/// and then triggers the node's shutdown signal.
pub fn shutdown(arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    ShutdownArguments::parse(arguments)?;

    Ok(CommandResult::Shutdown(
        RespValue::simple_string("OK").encode(),
    ))
}
