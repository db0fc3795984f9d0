mod commands;
mod connection;
