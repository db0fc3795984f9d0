use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Handles the Redis EXISTS command for a single key.
///
/// Expired keys count as missing, exactly as they do for GET.
pub async fn exists(
    state: &ServerState,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::InvalidExistsCommand);
    };

    let exists = state.store.lock().await.exists(key);

    Ok(CommandResult::Response(
        RespValue::Integer(i64::from(exists)).encode(),
    ))
}
