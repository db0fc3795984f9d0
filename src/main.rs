use anyhow::{Context, Result};
use tracing::{info, warn};

use redis_lite::server::{RedisServer, ServerConfig};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::from_args(std::env::args())?;
    let address = (config.bind_address, config.port);

    let server = RedisServer::bind(config)
        .await
        .with_context(|| format!("failed to bind {}:{}", address.0, address.1))?;

    let state = server.state();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c"),
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
        state.shutdown().trigger();
    });

    server.run().await;

    Ok(())
}
