//! # media-relay
//!
//! Relays batches of remotely hosted photos and videos into Telegram channels.
//!
//! A client (typically a browser extension) posts a note's metadata and its
//! media URLs. The batch is split into groups of at most ten, captioned once per
//! destination, and each item walks a ladder of delivery strategies:
//!
//! 1. **By reference**: the platform fetches the URL itself
//! 2. **Streamed re-upload**: the service downloads the media and uploads it
//! 3. **External relay**: a large-file relay takes over (when configured)
//!
//! Every delivery is reported per destination, group and item.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::{Config, DeliveryRequest, MediaItem, MediaRelay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_vars([
//!         ("TELEGRAM_BOT_TOKEN", "123456:ABC"),
//!         ("TELEGRAM_CHANNEL_ID", "@my_channel"),
//!     ])?;
//!
//!     let relay = MediaRelay::new(config)?;
//!     let report = relay
//!         .deliver(&DeliveryRequest {
//!             title: "Spring walk".into(),
//!             author: "mei".into(),
//!             source_tag: "xhs".into(),
//!             canonical_link: Some("https://www.xiaohongshu.com/explore/1".into()),
//!             items: vec![
//!                 MediaItem::photo("https://cdn.example/a.jpg"),
//!                 MediaItem::video("https://cdn.example/b.mp4"),
//!             ],
//!         })
//!         .await?;
//!
//!     println!("{} delivered, {} failed", report.delivered, report.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Caption formatting and MarkdownV2 escaping
pub mod caption;
/// Failure classification
pub mod classify;
/// Configuration types
pub mod config;
/// Tiered delivery pipeline
pub mod delivery;
/// Error types
pub mod error;
/// Batch partitioning
pub mod partition;
/// Media size probing
pub mod probe;
/// External large-file relay client
pub mod relay;
/// Retry logic with exponential backoff
pub mod retry;
/// Telegram Bot API client
pub mod telegram;
/// Core types
pub mod types;

// Re-export commonly used types
pub use classify::{
    DescriptionHeuristicClassifier, FailureClass, FailureClassifier, FailureOrigin,
    OversizeDetection, StatusCodeClassifier, UpstreamFailure,
};
pub use config::{Config, RelayConfig, RetryConfig};
pub use delivery::MediaRelay;
pub use error::{ApiError, DeliveryError, Error, Result, ToHttpStatus};
pub use relay::{HttpRelayClient, LargeFileRelay, RelayJob};
pub use telegram::{BotApiClient, MessagingPlatform, SendTarget};
pub use types::{
    CaptionPolicy, DeliveryOutcome, DeliveryReport, DeliveryRequest, Destination,
    DestinationReport, FailureDetail, FailureKind, MediaItem, MediaKind, Tier,
};

/// Resolves when the process is asked to stop.
///
/// Used as the API server's graceful-shutdown trigger.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, shutting down");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            match signal(SignalKind::interrupt()) {
                Ok(mut sigint) => {
                    sigint.recv().await;
                    tracing::info!("Received SIGINT, shutting down");
                }
                Err(_) => {
                    tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, shutting down");
                }
                Err(_) => {
                    tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                    tokio::signal::ctrl_c().await.ok();
                }
            }
        }
    }
}

/// Resolves when the process is asked to stop (Ctrl+C).
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
