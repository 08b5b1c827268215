//! media-relay server binary
//!
//! Loads configuration from the environment (and `.env` when present), then
//! serves the REST API until SIGINT/SIGTERM.

use media_relay::{Config, MediaRelay};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal in containers
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,media_relay=debug")),
        )
        .init();

    let config = Config::from_env()?;
    if let Err(e) = config.check_required() {
        tracing::warn!(error = %e, "Delivery is not configured; /send will fail until it is");
    }

    let relay = Arc::new(MediaRelay::new(config.clone())?);
    media_relay::api::start_api_server(relay, Arc::new(config)).await?;

    Ok(())
}
