//! API key check for the relay routes
//!
//! When `ApiConfig::api_key` is set, callers present it as an `X-Api-Key: <key>`
//! header or as `Authorization: Bearer <key>`. Keys are compared exactly, in
//! constant time.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Header carrying the key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware rejecting requests without the configured key with a 401 [`ApiError`]
///
/// `None` as state lets every request through.
///
/// ```no_run
/// use axum::{Router, middleware, routing::post};
/// use media_relay::api::auth::require_api_key;
///
/// let router = Router::<()>::new()
///     .route("/send", post(|| async { "sent" }))
///     .route_layer(middleware::from_fn_with_state(
///         Some("relay-key".to_string()),
///         require_api_key,
///     ));
/// ```
pub async fn require_api_key(
    State(expected): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let refusal = match presented_key(request.headers()) {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => None,
        Some(_) => Some("Invalid API key"),
        None => Some("Missing API key"),
    };

    match refusal {
        None => next.run(request).await,
        Some(message) => {
            tracing::debug!(path = %request.uri().path(), message, "Rejected unauthenticated request");
            ApiError::unauthorized(message).into_response()
        }
    }
}

/// Key from `X-Api-Key`, else from a bearer `Authorization` header
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER) {
        return key.to_str().ok();
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Compares every byte, whatever the position of the first mismatch
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
