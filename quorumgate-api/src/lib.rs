//! The HTTP/WebSocket transport layer: a REST surface over `Gateway` and a
//! `/ws` event stream fed by the consensus engine's event hook. Nothing in
//! this crate reaches back into the engine's internals — it only sees what
//! `Gateway` exposes and what `EventBroadcaster::hook()` is handed at
//! construction, keeping the dependency arrow pointing one way.

pub mod rest;
pub mod websocket;

pub use rest::AppState;
pub use websocket::EventBroadcaster;

use axum::Router;
use quorumgate_core::Gateway;
use std::sync::Arc;
use tracing::info;

pub struct ApiServer {
    bind_address: String,
    port: u16,
    router: Router,
}

impl ApiServer {
    pub fn new(gateway: Arc<Gateway>, broadcaster: Arc<EventBroadcaster>, bind_address: String, port: u16) -> Self {
        let router = rest::router(Arc::clone(&gateway)).merge(websocket::router(broadcaster));
        Self { bind_address, port, router }
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(%addr, "quorumgate api listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
