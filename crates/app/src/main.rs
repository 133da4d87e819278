//! Keynes - multiplayer "guess the fraction of the average" game server
//!
//! Reads its configuration, serves hubs over HTTP and WebSocket, and shuts
//! down cleanly on ctrl-c.

use keynes_core::Config;
use keynes_net::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Keynes");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> keynes_net::Result<()> {
    let server = Server::start(&config).await?;

    let origin = config
        .server
        .public_origin
        .clone()
        .unwrap_or_else(|| format!("http://{}", server.addr()));
    tracing::info!(origin = %origin, "Open this address to create a hub");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for ctrl-c: {}", e);
    }

    server.shutdown().await;
    server.wait().await;
    tracing::info!("Keynes stopped");
    Ok(())
}
