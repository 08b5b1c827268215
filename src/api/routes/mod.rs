//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`send`] - Media relay
//! - [`system`] - Banner, health, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::DeliveryReport;

mod send;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use send::*;
pub use system::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Response for POST /send
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SendResponse {
    /// True only when every item reached every destination
    pub ok: bool,
    /// Human-readable summary
    pub message: String,
    /// Per-destination outcomes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DeliveryReport>,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests
    pub status: String,
    /// Crate version
    pub version: String,
    /// Whether the bot token and main destination are configured
    pub configured: bool,
    /// Whether the large-file relay is configured
    pub relay: bool,
}
