//! Error types for media-relay
//!
//! Two layers of errors live here:
//! - [`Error`] fails a whole relay call (validation, configuration, internal faults)
//!   and maps onto an HTTP status via [`ToHttpStatus`]
//! - [`DeliveryError`] fails a single tier attempt and never leaves the delivery
//!   pipeline; it is folded into a per-outcome [`FailureDetail`](crate::types::FailureDetail)

use crate::classify::{FailureClass, UpstreamFailure};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or unparseable
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "TELEGRAM_BOT_TOKEN")
        key: Option<String>,
    },

    /// The inbound request is malformed or empty
    #[error("{0}")]
    Validation(String),

    /// HTTP client could not be built or used outside a delivery tier
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Configuration error naming the offending key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Failure of one tier attempt for one item or group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The platform, the media source or the relay transport failed
    #[error("{class}: {failure}")]
    Upstream {
        /// How the failure was classified
        class: FailureClass,
        /// Raw failure as reported by the collaborator
        failure: UpstreamFailure,
    },

    /// The relay answered but did not report `ok`
    #[error("relay declined delivery: {0}")]
    RelayDeclined(String),
}

impl DeliveryError {
    /// Classification used by the tier ladder
    pub fn class(&self) -> FailureClass {
        match self {
            DeliveryError::Upstream { class, .. } => *class,
            DeliveryError::RelayDeclined(_) => FailureClass::Rejected,
        }
    }

    /// Status code carried by the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Upstream { failure, .. } => failure.status,
            DeliveryError::RelayDeclined(_) => None,
        }
    }
}

/// API error response format
///
/// Every error body shares the `ok`/`message` shape of successful replies so
/// clients can check a single flag.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "ok": false,
///   "message": "No files to process.",
///   "code": "validation_error"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always false
    pub ok: bool,

    /// Human-readable error message
    pub message: String,

    /// Machine-readable error code (e.g., "validation_error", "config_error")
    pub code: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed or empty batch
            Error::Validation(_) => 400,

            // 500 Internal Server Error - the server is not set up to deliver
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            ok: false,
            message,
            code,
            details,
        }
    }
}
