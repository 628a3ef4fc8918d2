//! Galley node binary.

use galley_node::GalleyConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GalleyConfig::load()?;
    tracing::info!(bind = %config.server.bind, "Galley node starting");

    galley_node::run(config).await
}
