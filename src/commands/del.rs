use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    state::ServerState,
};

/// Handles the Redis DEL command for a single key.
///
/// Replies `:1` when the key was removed and `:0` when it was not there. A
/// successful delete on a master is forwarded to its replicas.
pub async fn del(
    state: &ServerState,
    arguments: &[Bytes],
    input: &RespValue,
) -> Result<CommandResult, CommandError> {
    let [key] = arguments else {
        return Err(CommandError::InvalidDelCommand);
    };

    let mut store_guard = state.store.lock().await;
    let removed = store_guard.delete(key);

    if removed {
        state.propagate(input).await;
    }

    Ok(CommandResult::Response(
        RespValue::Integer(i64::from(removed)).encode(),
    ))
}
