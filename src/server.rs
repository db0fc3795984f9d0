use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;
use tokio::{net::TcpListener, task::JoinSet};
use tracing::{debug, info, warn};

use crate::{connection::handle_client_connection, replication::run_replication, state::ServerState};

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag: {0}")]
    InvalidCommandLineFlag(String),
    #[error("Invalid value for command line flag {0}")]
    InvalidCommandLineFlagValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Master,
    Replica { host: String, port: u16 },
}

impl Role {
    /// Name used in `INFO` output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Replica { .. } => "slave",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub role: Role,
    /// Delay between attempts to (re)establish the link to the master.
    pub reconnect_delay: Duration,
    /// Period of the background expiry sweep; `None` leaves expiry purely lazy.
    pub expiry_sweep_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            role: Role::Master,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            expiry_sweep_interval: Some(DEFAULT_EXPIRY_SWEEP_INTERVAL),
        }
    }
}

impl ServerConfig {
    pub fn master(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn replica_of(port: u16, master_host: impl Into<String>, master_port: u16) -> Self {
        Self {
            port,
            role: Role::Replica {
                host: master_host.into(),
                port: master_port,
            },
            ..Self::default()
        }
    }

    /// Builds a configuration from process arguments (the first one is the
    /// program name). Supported flags: `--port <n>`, `--replicaof "<host> <port>"`
    /// and `--bind <ip>`.
    pub fn from_args<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut config = Self::default();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(arg.clone()))?;

                    config.port = parse_port(&value)
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(arg.clone()))?;
                }
                "--replicaof" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(arg.clone()))?;

                    let mut parts = value.split_whitespace();
                    let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next())
                    else {
                        return Err(CliError::InvalidCommandLineFlagValue(arg));
                    };

                    let port = parse_port(port)
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(arg.clone()))?;

                    config.role = Role::Replica {
                        host: host.to_string(),
                        port,
                    };
                }
                "--bind" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| CliError::InvalidCommandLineFlagValue(arg.clone()))?;

                    config.bind_address = value
                        .parse::<IpAddr>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue(arg.clone()))?;
                }
                _ => return Err(CliError::InvalidCommandLineFlag(arg)),
            }
        }

        Ok(config)
    }
}

fn parse_port(value: &str) -> Option<u16> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// A bound node, ready to serve.
pub struct RedisServer {
    listener: TcpListener,
    state: Arc<ServerState>,
}

impl RedisServer {
    /// Binds the listening socket. Failing to bind is the only fatal startup error.
    pub async fn bind(config: ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind((config.bind_address, config.port)).await?;

        Ok(Self {
            listener,
            state: Arc::new(ServerState::new(config)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Serves connections until shutdown is triggered, then waits for every
    /// connection task to finish.
    pub async fn run(self) {
        let RedisServer { listener, state } = self;
        let shutdown = state.shutdown().clone();
        let mut tasks = JoinSet::new();

        let listening_port = match listener.local_addr() {
            Ok(address) => address.port(),
            Err(_) => state.config.port,
        };

        info!(
            role = state.role().as_str(),
            port = listening_port,
            "server listening"
        );

        if let Some(interval) = state.config.expiry_sweep_interval {
            tasks.spawn(sweep_expired_keys(Arc::clone(&state), interval));
        }

        if let Role::Replica { host, port } = state.role().clone() {
            tasks.spawn(run_replication(
                Arc::clone(&state),
                host,
                port,
                listening_port,
            ));
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_address)) => {
                        debug!(peer = %peer_address, "accepted connection");
                        tasks.spawn(handle_client_connection(stream, peer_address, Arc::clone(&state)));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                _ = shutdown.wait() => break,
            }

            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    warn!(error = %e, "connection task failed");
                }
            }
        }

        drop(listener);
        info!("shutdown initiated, waiting for connections to close");

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!(error = %e, "connection task failed");
            }
        }

        state.replicas.lock().await.clear();
        info!("server stopped");
    }
}

async fn sweep_expired_keys(state: Arc<ServerState>, period: Duration) {
    let shutdown = state.shutdown().clone();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut store = state.store.lock().await;
                let removed = store.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "purged expired keys");
                }
            }
            _ = shutdown.wait() => break,
        }
    }
}
