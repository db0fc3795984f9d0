use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

/// Handles the Redis ECHO command.
///
/// Returns the single argument back to the caller as a bulk string, byte for
/// byte.
///
/// # Examples
///
/// ```ignore
/// // ECHO "hello world"
/// let result = echo(&[Bytes::from("hello world")]);
/// // Returns: "$11\r\nhello world\r\n"
/// ```
pub fn echo(arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let [message] = arguments else {
        return Err(CommandError::InvalidEchoCommand);
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(message.clone()).encode(),
    ))
}
