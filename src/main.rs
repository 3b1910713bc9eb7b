//! Binary entry point: loads configuration, wires the gateway orchestrator
//! to the HTTP/WebSocket transport, and runs until a shutdown signal.

use anyhow::Result;
use quorumgate_api::{ApiServer, EventBroadcaster};
use quorumgate_core::{Gateway, GatewayConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("quorumgate=info".parse()?))
        .init();

    info!("starting quorumgate");

    let config = GatewayConfig::load("gateway.config.json").await?;
    let bind_address = config.bind_address.clone();
    let port = config.port;

    let broadcaster = Arc::new(EventBroadcaster::new());
    let gateway = match Gateway::new(config, broadcaster.hook()).await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(%e, "failed to initialize gateway");
            return Err(e);
        }
    };

    info!(n = gateway.n(), f = gateway.f(), "gateway ready");

    let server = ApiServer::new(gateway, broadcaster, bind_address, port);
    server.serve().await
}
