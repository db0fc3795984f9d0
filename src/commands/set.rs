use std::time::Duration;

use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        command_handler::{argument_str, CommandResult},
    },
    resp::RespValue,
    state::ServerState,
};

/// Represents the parsed arguments for SET command
#[derive(Debug, PartialEq)]
pub struct SetArguments {
    /// The key name to store the value under
    key: Bytes,
    /// The value to be stored under the given key
    value: Bytes,
    /// Time to live of the key value pair
    ttl: Option<Duration>,
}

impl SetArguments {
    /// Parses command arguments into a SetArguments structure.
    ///
    /// Two forms are accepted:
    ///   - `[key, value]` - permanent storage
    ///   - `[key, value, "PX", milliseconds]` - storage that expires after the
    ///     given number of milliseconds
    ///
    /// # Returns
    ///
    /// * `Ok(SetArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::InvalidSetCommand)` - If the number of arguments is not 2 or 4
    /// * `Err(CommandError::InvalidSetCommandArgument)` - If the expiration option is not "PX"
    /// * `Err(CommandError::InvalidSetCommandExpiration)` - If the expiration time is not a
    ///   positive integer
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let result = SetArguments::parse(&[Bytes::from("mykey"), Bytes::from("hello")]);
    /// // Returns: Ok(SetArguments { key: "mykey", value: "hello", ttl: None })
    ///
    /// let result = SetArguments::parse(&[
    ///     Bytes::from("mykey"),
    ///     Bytes::from("hello"),
    ///     Bytes::from("EX"),  // Should be "PX"
    ///     Bytes::from("1000"),
    /// ]);
    /// // Returns: Err(CommandError::InvalidSetCommandArgument)
    /// ```
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        match arguments {
            [key, value] => Ok(Self {
                key: key.clone(),
                value: value.clone(),
                ttl: None,
            }),
            [key, value, option, milliseconds] => {
                if !option.eq_ignore_ascii_case(b"px") {
                    return Err(CommandError::InvalidSetCommandArgument);
                }

                let milliseconds =
                    argument_str(milliseconds, CommandError::InvalidSetCommandExpiration)?
                        .parse::<u64>()
                        .map_err(|_| CommandError::InvalidSetCommandExpiration)?;

                if milliseconds == 0 {
                    return Err(CommandError::InvalidSetCommandExpiration);
                }

                Ok(Self {
                    key: key.clone(),
                    value: value.clone(),
                    ttl: Some(Duration::from_millis(milliseconds)),
                })
            }
            _ => Err(CommandError::InvalidSetCommand),
        }
    }
}

/// Handles the Redis SET command.
///
/// Stores the pair, then forwards the received command to replicas when this
/// node is a master. Propagation runs while the store lock is still held so
/// replicas apply concurrent writes in the order the master applied them.
///
/// # Examples
///
/// ```ignore
/// // SET mykey "hello" PX 1000  (expires in 1 second)
/// let result = set(&state, &arguments, &input).await;
/// // Returns: "+OK\r\n"
/// ```
pub async fn set(
    state: &ServerState,
    arguments: &[Bytes],
    input: &RespValue,
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let mut store_guard = state.store.lock().await;
    store_guard.set(set_arguments.key, set_arguments.value, set_arguments.ttl);
    state.propagate(input).await;

    Ok(CommandResult::Response(
        RespValue::simple_string("OK").encode(),
    ))
}
