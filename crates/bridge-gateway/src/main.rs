//! Bridge entry point
//!
//! Run with:
//! ```bash
//! cargo run -p bridge-gateway --bin bridge
//! ```
//!
//! Configuration is loaded from environment variables.

use bridge_common::{
    try_init_tracing_with_config, AppError, AppResult, BridgeConfig, PlatformClient,
    TracingConfig,
};
use bridge_delivery::DeliveryQueue;
use bridge_gateway::client::HttpDiscovery;
use bridge_gateway::connection::FileSessionStore;
use bridge_gateway::handlers::RelayHandler;
use bridge_gateway::GatewayClient;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, code = e.error_code(), "Bridge failed");
        std::process::exit(1);
    }
}

async fn run(config: BridgeConfig) -> AppResult<()> {
    info!(name = %config.app.name, env = ?config.app.env, "Starting bridge");

    let platform = PlatformClient::new(&config.platform)?;
    if platform.is_forwarding() {
        info!("Platform requests are relayed through the forward endpoint");
    }

    let queue = DeliveryQueue::spawn(config.delivery.clone(), Arc::new(platform.clone()));
    let handler = Arc::new(RelayHandler::new(queue, config.relay.channel_id.clone()));

    let store = Arc::new(FileSessionStore::new(config.gateway.session_file.clone()));
    let discovery = Arc::new(HttpDiscovery::new(platform, config.gateway.compress));

    let client = GatewayClient::new(config.gateway, discovery, store, handler).await;
    let handle = client.handle();
    let gateway = tokio::spawn(client.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    handle.shutdown();
    gateway.await.map_err(AppError::internal)?;

    info!("Bridge stopped");
    Ok(())
}
