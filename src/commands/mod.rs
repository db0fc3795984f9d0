mod command_error;
mod command_handler;
mod del;
mod echo;
mod exists;
mod get;
mod info;
mod ping;
mod replication;
mod set;
mod shutdown;

pub use command_error::CommandError;
pub use command_handler::{CommandHandler, CommandResult};
