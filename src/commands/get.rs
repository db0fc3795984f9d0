use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Handles the Redis GET command.
///
/// Retrieves the value stored under a key. A key whose TTL has passed is
/// removed on the spot and reported as missing.
///
/// # Returns
///
/// * `Ok(CommandResult::Response)` - bulk string with the value, or a null
///   bulk string if the key does not exist or has expired
/// * `Err(CommandError::InvalidGetCommand)` - if the number of arguments is not exactly 1
///
/// # Examples
///
/// ```ignore
/// // GET mykey
/// let result = get(&state, &[Bytes::from("mykey")]).await;
/// // Returns: "$5\r\nhello\r\n" or "$-1\r\n" (null)
/// ```
pub async fn get(state: &ServerState, arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::InvalidGetCommand);
    };

    let value = state.store.lock().await.get(key);

    let response = match value {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(response.encode()))
}
