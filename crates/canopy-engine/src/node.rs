//! Canopy Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with shared RocksDB storage
//! - HTTP API for dashboards and registration
//! - Unix admin socket for local admin ops (canopy-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::network::Network;
use crate::storage::RocksStore;
use std::sync::Arc;

/// A Canopy node instance.
pub struct CanopyNode {
    network: Arc<Network>,
    config: NodeConfig,
}

impl CanopyNode {
    /// Open storage under the data directory and load the network.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        let store = Arc::new(RocksStore::open(config.data_dir.join("nodes"))?);
        let network = Arc::new(Network::open(config.engine.clone(), store)?);

        Ok(Self { network, config })
    }

    /// Get the shared network (for API handlers and tests).
    pub fn network(&self) -> Arc<Network> {
        Arc::clone(&self.network)
    }

    /// Run the node (starts HTTP server and admin socket) until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Canopy node starting");
        tracing::info!("  API: http://{}", self.config.api_addr);
        tracing::info!("  Admin: {:?}", self.config.admin_socket);
        tracing::info!("  Data: {:?}", self.config.data_dir);
        tracing::info!("  Nodes: {}", self.network.len());

        // Start admin socket server in background
        let admin_socket = AdminSocket::new(self.network(), self.config.admin_socket.clone());
        tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        // Build HTTP API
        let app = api::build_router(self.network());

        // Start HTTP server
        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", self.config.api_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let pending = self.network.pending_saves();
        if !pending.is_empty() {
            match self.network.flush_pending() {
                Ok(flushed) => tracing::info!("Flushed {} pending saves on shutdown", flushed),
                Err(e) => tracing::error!("Saves still pending at shutdown: {}", e),
            }
        }
        tracing::info!("Canopy node stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use canopy_topology::{NodeId, Role};
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            data_dir: dir.join("data"),
            api_addr: "127.0.0.1:0".parse().unwrap(),
            admin_socket: dir.join("admin.sock"),
            engine: EngineConfig::default(),
        }
    }

    #[tokio::test]
    async fn new_node_seeds_and_reopens() {
        let dir = tempdir().unwrap();
        {
            let node = CanopyNode::new(config(dir.path())).await.unwrap();
            let network = node.network();
            assert_eq!(network.len(), 1);
            network
                .register_customer("Ann", "ann@example.com", None)
                .unwrap();
        }

        let node = CanopyNode::new(config(dir.path())).await.unwrap();
        let network = node.network();
        assert_eq!(network.len(), 2);
        assert!(network.by_id(&NodeId::new(Role::Customer, 1)).is_ok());
    }
}
