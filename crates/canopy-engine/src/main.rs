//! Canopy Node binary
//!
//! Serves the referral network over HTTP and the local admin socket.

use canopy_engine::{CanopyNode, NodeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    canopy_logging::init(canopy_logging::DEFAULT_DIRECTIVES);

    tracing::info!("Starting Canopy Node");

    let config = NodeConfig::from_env()?;

    // Create and run node
    let node = CanopyNode::new(config).await?;
    node.run().await?;

    Ok(())
}
