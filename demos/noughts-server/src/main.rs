use std::sync::Arc;

use noughts::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        eviction_grace = ?config.room.eviction_grace,
        persist_timeout = ?config.room.persist_timeout,
        "starting noughts server"
    );

    // Development store: games and tallies live only as long as the process.
    let server = NoughtsServerBuilder::with_config(config)
        .build(Arc::new(MemoryStore::new()))
        .await?;

    server.run().await?;
    Ok(())
}
