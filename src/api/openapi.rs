//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-relay REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-relay REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/api/v1/openapi.json` - The same document, as loaded by Swagger UI
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-relay REST API",
        version = "0.1.0",
        description = "Relays batches of remote photos and videos into Telegram channels, escalating from by-reference sends to streamed re-uploads to an external large-file relay",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Relay
        crate::api::routes::send_media,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Request types from types.rs
        crate::types::DeliveryRequest,
        crate::types::MediaItem,
        crate::types::MediaKind,

        // Report types from types.rs
        crate::types::DeliveryReport,
        crate::types::DestinationReport,
        crate::types::DeliveryOutcome,
        crate::types::FailureDetail,
        crate::types::FailureKind,
        crate::types::Tier,
        crate::types::CaptionPolicy,

        // API response types from routes
        crate::api::routes::SendResponse,
        crate::api::routes::HealthResponse,

        // Error types from error.rs
        crate::error::ApiError,
    )),
    tags(
        (name = "relay", description = "Media relay - Deliver a media batch to every configured destination"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
