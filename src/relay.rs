//! External large-file relay
//!
//! The relay is the last tier: it receives the media URL and destination and
//! delivers the file itself (typically through an account without the bot upload
//! limit). It is opaque to this service; only its `ok` flag counts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::{FailureClassifier, FailureOrigin, StatusCodeClassifier, UpstreamFailure};
use crate::config::RelayConfig;
use crate::error::{DeliveryError, Result};
use crate::types::MediaKind;

/// Work handed to the relay for one item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayJob {
    /// Chat or channel that should receive the file
    pub destination_channel: String,
    /// Where the relay fetches the media
    pub file_url: String,
    /// Caption for the message, empty for none
    pub caption: String,
    /// Whether the caption is MarkdownV2
    pub use_rich_formatting: bool,
    /// Media kind
    pub kind: MediaKind,
}

/// Trait for the external large-file relay
#[async_trait]
pub trait LargeFileRelay: Send + Sync {
    /// Hand one item over to the relay
    ///
    /// Succeeds only when the relay replies with `ok: true`.
    async fn delegate(&self, job: &RelayJob) -> std::result::Result<Value, DeliveryError>;

    /// Endpoint for logging
    fn endpoint(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct RelayReply {
    #[serde(default)]
    ok: bool,
    #[serde(default, alias = "description", alias = "error")]
    message: Option<String>,
}

/// [`LargeFileRelay`] reached with a single JSON `POST`
#[derive(Clone, Debug)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    endpoint: String,
    auth_header: Option<String>,
}

impl HttpRelayClient {
    /// Create a client for the configured relay
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            auth_header: config.auth_header.clone(),
        })
    }

    fn failure(failure: UpstreamFailure) -> DeliveryError {
        // The relay's own contract: retry on 5xx/429/timeouts, never on refusals
        DeliveryError::Upstream {
            class: StatusCodeClassifier.classify(&failure),
            failure,
        }
    }
}

#[async_trait]
impl LargeFileRelay for HttpRelayClient {
    async fn delegate(&self, job: &RelayJob) -> std::result::Result<Value, DeliveryError> {
        tracing::debug!(
            channel = %job.destination_channel,
            kind = %job.kind,
            "Delegating item to relay"
        );

        let mut request = self.client.post(&self.endpoint).json(job);
        if let Some(auth) = &self.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::failure(UpstreamFailure::from_reqwest(FailureOrigin::Relay, &e)))?;
        let status = response.status();

        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
        {
            return Err(Self::failure(UpstreamFailure::http(
                FailureOrigin::Relay,
                status.as_u16(),
                status.canonical_reason().unwrap_or("relay unavailable"),
            )));
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                let failure = if status.is_success() {
                    UpstreamFailure::from_reqwest(FailureOrigin::Relay, &e)
                } else {
                    UpstreamFailure::http(
                        FailureOrigin::Relay,
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("relay error"),
                    )
                };
                return Err(Self::failure(failure));
            }
        };

        let reply: RelayReply = serde_json::from_value(body.clone()).unwrap_or(RelayReply {
            ok: false,
            message: None,
        });
        if reply.ok {
            return Ok(body);
        }

        let message = reply
            .message
            .unwrap_or_else(|| format!("relay replied {} without ok", status.as_u16()));
        Err(DeliveryError::RelayDeclined(message))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
