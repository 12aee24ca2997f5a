//! Tontine Node binary
//!
//! Ticks a tontine store until interrupted.

use tontine_core::Tontine;
use tontine_node::{NodeConfig, TickNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tontine_node=info,tontine_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tontine Node");

    let config = NodeConfig::from_env()?;
    tracing::info!("  Data: {:?}", config.data_dir);
    tracing::info!("  Activation: {:?}", config.tontine.activation);

    #[cfg(feature = "rocksdb")]
    let store = tontine_core::RocksStore::open(&config.data_dir)?;
    #[cfg(not(feature = "rocksdb"))]
    let store = {
        tracing::warn!("Built without the rocksdb feature; state lives in memory only");
        tontine_core::MemoryStore::new()
    };

    let node = TickNode::new(Tontine::new(store, config.tontine.clone()), config.tick_interval);
    node.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await?;

    Ok(())
}
