//! Pressmill server binary.

use anyhow::Result;
use pressmill_server::config::{load_config, validate_config};
use pressmill_server::Server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = load_config()?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(errors) = validate_config(&config) {
        for err in &errors {
            error!(error = %err, "Invalid configuration");
        }
        anyhow::bail!("configuration validation failed");
    }

    info!("Starting Pressmill Server v{}", env!("CARGO_PKG_VERSION"));

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}
