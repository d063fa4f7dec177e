//! # Ephemera Server
//!
//! Ephemeral room-based chat relay. Messages are fanned out to everyone in
//! the room and never stored.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! ephemera
//!
//! # Run with a specific config file
//! EPHEMERA_CONFIG=/path/to/ephemera.toml ephemera
//!
//! # Run with environment variables
//! EPHEMERA_PORT=8080 EPHEMERA_HOST=0.0.0.0 ephemera
//! ```

mod config;
mod handlers;
mod metrics;
mod pages;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ephemera=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load()?;

    tracing::info!(
        "Starting Ephemera server on {}:{} ({:?} output)",
        config.host,
        config.port,
        config.transport.outbound_format
    );

    if config.metrics.enabled {
        metrics::init_metrics();
    }

    handlers::run_server(config).await?;

    Ok(())
}
